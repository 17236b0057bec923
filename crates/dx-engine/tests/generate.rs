mod common;

use common::{generator, successor, trigrams_unique, ChainModel, LAYERS};
use dx_engine::{mirrored, CancelToken, EngineError, GenerateParams, GenerationState};
use dx_model::ModelError;
use dx_sampler::SamplerError;
use futures::executor::block_on;

#[test]
fn test_greedy_follows_chain_and_mirrors() {
    let mut gen = generator(ChainModel::new("fwd"), ChainModel::new("bwd"));
    let tokens = block_on(gen.generate(&[8], &GenerateParams::greedy(5), None)).unwrap();

    let forward = vec![2, 8, 9, 12, 5, 0];
    assert_eq!(forward[2], successor(8));
    assert_eq!(tokens, mirrored(&forward));
    assert_eq!(tokens, vec![2, 8, 9, 12, 5, 0, 5, 12, 9, 8, 2]);
    assert_eq!(gen.state(), GenerationState::Done);
}

#[test]
fn test_feeds_seen_by_sessions() {
    let fwd = ChainModel::new("fwd");
    let bwd = ChainModel::new("bwd");
    let fwd_calls = fwd.calls.clone();
    let bwd_calls = bwd.calls.clone();
    let mut gen = generator(fwd, bwd);
    block_on(gen.generate(&[8], &GenerateParams::greedy(3), None)).unwrap();

    let fwd_calls = fwd_calls.borrow();
    let bwd_calls = bwd_calls.borrow();
    assert_eq!(fwd_calls.len(), 3);
    assert_eq!(bwd_calls.len(), 3);

    assert_eq!(fwd_calls[0].tokens, vec![2, 8]);
    assert_eq!(fwd_calls[2].tokens, vec![2, 8, 9, 12]);
    for (f, b) in fwd_calls.iter().zip(bwd_calls.iter()) {
        assert_eq!(b.tokens[0], 5);
        assert_eq!(b.tokens[1..], f.tokens[1..]);
    }

    for (i, call) in fwd_calls.iter().enumerate() {
        let len = call.tokens.len();
        assert_eq!(call.mask_len, len);
        assert_eq!(call.position_ids, Some((0..len as i64).collect::<Vec<_>>()));
        let cached = if i == 0 { 0 } else { fwd_calls[i - 1].tokens.len() };
        assert_eq!(call.cache_seq, vec![cached; LAYERS]);
    }
}

#[test]
fn test_repeated_trigram_is_blocked() {
    let mut gen = generator(ChainModel::new("fwd"), ChainModel::new("bwd"));
    let report =
        block_on(gen.generate_with_report(&[8], &GenerateParams::greedy(30), None)).unwrap();

    // 8 9 12 5 0 1 4 13 closes a cycle; the second (8, 9) may not be
    // followed by 12 again.
    assert_eq!(report.forward[1..10], [8, 9, 12, 5, 0, 1, 4, 13, 8]);
    assert_eq!(report.forward[10], 9);
    assert_eq!(report.forward[11], 13);
    assert!(trigrams_unique(&report.forward));
    assert_eq!(report.forward.len(), 31);
    assert_eq!(report.generated, 29);
}

#[test]
fn test_prompt_over_budget_returns_prompt() {
    let fwd = ChainModel::new("fwd");
    let calls = fwd.calls.clone();
    let mut gen = generator(fwd, ChainModel::new("bwd"));
    let tokens =
        block_on(gen.generate(&[8, 9, 10], &GenerateParams::greedy(2), None)).unwrap();

    assert_eq!(tokens, mirrored(&[2, 8, 9, 10]));
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_progress_reports_each_step() {
    let mut gen = generator(ChainModel::new("fwd"), ChainModel::new("bwd"));
    let mut seen: Vec<Vec<u32>> = Vec::new();
    let mut record = |tokens: &[u32]| seen.push(tokens.to_vec());
    let tokens =
        block_on(gen.generate(&[8], &GenerateParams::greedy(3), Some(&mut record))).unwrap();

    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], mirrored(&[2, 8, 9]));
    assert_eq!(seen.last(), Some(&tokens));
}

#[test]
fn test_abort_from_progress_callback() {
    let fwd = ChainModel::new("fwd");
    let calls = fwd.calls.clone();
    let mut gen = generator(fwd, ChainModel::new("bwd"));
    let handle = gen.abort_handle();
    let mut abort = |_: &[u32]| handle.cancel();

    let report = block_on(gen.generate_with_report(
        &[8],
        &GenerateParams::greedy(10),
        Some(&mut abort),
    ))
    .unwrap();

    assert_eq!(report.state, GenerationState::Aborted);
    assert_eq!(report.forward, vec![2, 8, 9]);
    assert_eq!(report.tokens, mirrored(&report.forward));
    assert_eq!(calls.borrow().len(), 1);
    assert_eq!(gen.state(), GenerationState::Aborted);
}

#[test]
fn test_abort_flag_cleared_by_next_call() {
    let mut gen = generator(ChainModel::new("fwd"), ChainModel::new("bwd"));
    gen.abort();
    let report =
        block_on(gen.generate_with_report(&[8], &GenerateParams::greedy(4), None)).unwrap();
    assert_eq!(report.state, GenerationState::Done);
    assert_eq!(report.forward.len(), 5);
}

#[test]
fn test_cancelled_token_stops_before_first_step() {
    let mut gen = generator(ChainModel::new("fwd"), ChainModel::new("bwd"));
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = block_on(gen.generate_with_cancel(
        &[8, 9],
        &GenerateParams::greedy(10),
        &cancel,
        None,
    ))
    .unwrap();

    assert_eq!(report.state, GenerationState::Aborted);
    assert_eq!(report.tokens, mirrored(&[2, 8, 9]));
    assert_eq!(report.generated, 0);
}

#[test]
fn test_session_failure_propagates() {
    let mut gen = generator(ChainModel::new("fwd").failing_on(1), ChainModel::new("bwd"));
    let result = block_on(gen.generate(&[8], &GenerateParams::greedy(5), None));

    assert!(matches!(
        result,
        Err(EngineError::Model(ModelError::Session { .. }))
    ));
    assert_eq!(gen.state(), GenerationState::Failed);

    // The next call starts from fresh feeds.
    let tokens = block_on(gen.generate(&[8], &GenerateParams::greedy(2), None)).unwrap();
    assert_eq!(tokens, mirrored(&[2, 8, 9, 12]));
    assert_eq!(gen.state(), GenerationState::Done);
}

#[test]
fn test_nan_logits_rejected() {
    let mut gen = generator(ChainModel::new("fwd"), ChainModel::new("bwd").poisoned_on(0));
    let result = block_on(gen.generate(&[8], &GenerateParams::greedy(5), None));
    assert!(matches!(
        result,
        Err(EngineError::Sampler(SamplerError::NonFinite { token: 3, .. }))
    ));
    assert_eq!(gen.state(), GenerationState::Failed);
}

#[test]
fn test_invalid_params_rejected() {
    let fwd = ChainModel::new("fwd");
    let calls = fwd.calls.clone();
    let mut gen = generator(fwd, ChainModel::new("bwd"));
    let result = block_on(gen.generate(&[8], &GenerateParams::greedy(10_000), None));
    assert!(matches!(result, Err(EngineError::InvalidParams(_))));
    assert!(calls.borrow().is_empty());
}

#[test]
fn test_reset_disposes_caches() {
    let mut gen = generator(ChainModel::new("fwd"), ChainModel::new("bwd"));
    block_on(gen.generate(&[8], &GenerateParams::greedy(3), None)).unwrap();
    assert!(gen.feeds().forward.cache()[0].seq_len() > 0);

    gen.reset().unwrap();
    assert_eq!(gen.state(), GenerationState::Init);
    assert_eq!(gen.feeds().forward.cache()[0].seq_len(), 0);
    assert_eq!(gen.feeds().backward.cache()[0].seq_len(), 0);
}

#[test]
fn test_consecutive_calls_are_independent() {
    let mut gen = generator(ChainModel::new("fwd"), ChainModel::new("bwd"));
    let first = block_on(gen.generate(&[8], &GenerateParams::greedy(6), None)).unwrap();
    let second = block_on(gen.generate(&[8], &GenerateParams::greedy(6), None)).unwrap();
    assert_eq!(first, second);
}
