use std::fmt;

/// A tensor shape, wrapping a vector of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Total number of elements (product of all dimension sizes).
    ///
    /// A shape with any zero-sized axis has no elements; this is how empty
    /// key/value caches are represented.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let s = Shape::new(vec![1, 4, 94]);
        assert_eq!(s.numel(), 376);
        assert_eq!(s.dims(), &[1, 4, 94]);
    }

    #[test]
    fn test_empty_axis() {
        let s = Shape::new(vec![1, 2, 0, 64]);
        assert_eq!(s.numel(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::new(vec![1, 3]).to_string(), "[1, 3]");
        assert_eq!(Shape::new(vec![]).to_string(), "[]");
    }
}
