mod support;

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use kopi_engine::RecompilePolicy;
use kopi_scheduler::{ProgressEvent, TaskError};

use support::harness;

#[tokio::test(flavor = "multi_thread")]
async fn narrowing_filters_cached_items_without_recompute() {
    let h = harness();
    let path = Path::new("A.kt");

    let full = h
        .engine
        .complete_at_with_context(path, "pri", "pri", 0, 3, 3)
        .join()
        .await
        .expect("full computation");
    assert_eq!(
        full.labels(),
        vec!["print", "println", "private", "printStackTrace"]
    );
    assert_eq!(h.provider.count(), 1);
    assert_eq!(h.compiler.count(), 1);

    // Typing one more character on the same line narrows the cached list;
    // neither the compiler nor the completion algorithm runs again.
    let narrowed = h
        .engine
        .complete_at_with_context(path, "prin", "prin", 0, 4, 4)
        .join()
        .await
        .expect("narrowed result");
    assert_eq!(narrowed.labels(), vec!["print", "println", "printStackTrace"]);
    assert_eq!(h.provider.count(), 1);
    assert_eq!(h.compiler.count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn divergent_prefix_forces_full_recomputation() {
    let h = harness();
    let path = Path::new("A.kt");

    h.engine
        .complete_at_with_context(path, "pri", "pri", 0, 3, 3)
        .join()
        .await
        .expect("full computation");

    // "pub" does not extend "pri": the cache is discarded, not patched.
    let recomputed = h
        .engine
        .complete_at_with_context(path, "pub", "pub", 0, 3, 3)
        .join()
        .await
        .expect("recomputed result");
    assert_eq!(recomputed.labels(), vec!["public"]);
    assert_eq!(h.provider.count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn request_on_another_line_forces_full_recomputation() {
    let h = harness();
    let path = Path::new("A.kt");

    h.engine
        .complete_at_with_context(path, "pri", "pri", 0, 3, 3)
        .join()
        .await
        .expect("full computation");
    h.engine
        .complete_at_with_context(path, "x\npri", "pri", 1, 3, 5)
        .join()
        .await
        .expect("recomputed result");
    assert_eq!(h.provider.count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn dot_bypasses_cache_and_returns_members() {
    let h = harness();
    let path = Path::new("A.kt");

    let text = "class A { fun f(s: String) { s. } }";
    let cursor = text.find("s.").expect("fixture has a dot") + 2;
    let members = h
        .engine
        .complete_at(path, text, cursor)
        .join()
        .await
        .expect("member completion");
    assert_eq!(members.labels(), vec!["length", "chars", "isEmpty"]);
    assert_eq!(h.provider.count(), 1);
    assert_eq!(h.compiler.count(), 1);

    // Typing a member prefix after the dot narrows against the member list.
    let text = "class A { fun f(s: String) { s.le } }";
    let narrowed = h
        .engine
        .complete_at(path, text, cursor + 2)
        .join()
        .await
        .expect("narrowed members");
    assert_eq!(narrowed.labels(), vec!["length"]);
    assert_eq!(h.provider.count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn superseded_request_never_delivers_its_result() {
    let h = harness();
    let path = Path::new("A.kt");

    let first = h.engine.complete_at(path, "val p = 1 //#slow", 5);
    h.provider.wait_started();

    let second = h.engine.complete_at(path, "val pr = 1", 6);
    assert_eq!(
        second.join().await.expect("newest request wins").labels(),
        vec!["print", "println", "private", "printStackTrace"]
    );
    assert_eq!(first.join().await, Err(TaskError::Cancelled));
    assert_eq!(h.provider.count(), 2);

    // The cancelled computation did not overwrite the cache: the second
    // request's context still narrows.
    let narrowed = h
        .engine
        .complete_at(path, "val pri = 1", 7)
        .join()
        .await
        .expect("narrowed result");
    assert_eq!(narrowed.labels(), vec!["print", "println", "private", "printStackTrace"]);
    assert_eq!(h.provider.count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn indexing_phase_fails_fast_with_an_empty_result() {
    let h = harness();
    let path = Path::new("A.kt");

    h.engine.set_indexing(true);
    let empty = h
        .engine
        .complete_at(path, "pri", 3)
        .join()
        .await
        .expect("fail-fast result");
    assert!(empty.is_empty());
    assert_eq!(h.provider.count(), 0);
    assert_eq!(h.compiler.count(), 0);

    h.engine.set_indexing(false);
    let served = h
        .engine
        .complete_at(path, "pri", 3)
        .join()
        .await
        .expect("served after indexing");
    assert!(!served.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn fatal_parse_failure_degrades_instead_of_failing() {
    let h = harness();
    let path = Path::new("A.kt");

    let list = h
        .engine
        .complete_at(path, "pri #fatal", 3)
        .join()
        .await
        .expect("degraded completion");
    assert_eq!(
        list.labels(),
        vec!["print", "println", "private", "printStackTrace"]
    );
    // The failed compile left the file dirty for the next forced pass.
    assert!(h.engine.store().is_dirty(path));
}

#[tokio::test(flavor = "multi_thread")]
async fn context_aware_completion_drives_the_progress_signal() {
    let h = harness();
    let mut progress = h.engine.scheduler().subscribe_progress();

    h.engine
        .complete_at_with_context(Path::new("A.kt"), "pri", "pri", 0, 3, 3)
        .join()
        .await
        .expect("full computation");

    assert!(matches!(
        progress.try_recv(),
        Ok(ProgressEvent::Started { .. })
    ));
    assert!(matches!(
        progress.try_recv(),
        Ok(ProgressEvent::Finished { .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn after_dot_without_a_dot_behaves_exactly_like_never() {
    let h = harness();
    let path = Path::new("A.kt");

    let warm = h.engine.recover(path, "val x = 1", RecompilePolicy::Always, 0);
    assert_eq!(h.compiler.count(), 1);

    // The file is dirty again; NEVER and dot-less AFTER_DOT both serve the
    // stale snapshot, down to the same model reference.
    let never = h.engine.recover(path, "val xx = 1", RecompilePolicy::Never, 0);
    let after_dot = h
        .engine
        .recover(path, "val xx = 1", RecompilePolicy::AfterDot, 6);
    assert!(Arc::ptr_eq(&warm, &never));
    assert!(Arc::ptr_eq(&warm, &after_dot));
    assert!(Arc::ptr_eq(warm.model(), after_dot.model()));
    assert_eq!(h.compiler.count(), 1);

    let text = "val xx = y.";
    let fresh = h
        .engine
        .recover(path, text, RecompilePolicy::AfterDot, text.len());
    assert!(!Arc::ptr_eq(&warm, &fresh));
    assert_eq!(h.compiler.count(), 2);
}
