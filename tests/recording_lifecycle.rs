//! Recorder lifecycle tests
//!
//! Drive a full session with a scripted microphone and encoder on paused
//! tokio time, so durations and tick counts are exact.

mod common;

use common::{EncoderControl, MockEncoder, MockProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use vocalist::error::CaptureError;
use vocalist::recording::{EncoderEvent, Recorder, RecorderEvent, RecorderOptions};
use vocalist::SessionState;

/// Recorder wired to mocks, with its observer events collected on a channel
fn recorder(
    provider: &Arc<MockProvider>,
    control: &Arc<EncoderControl>,
    options: RecorderOptions,
) -> (Recorder, mpsc::UnboundedReceiver<RecorderEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let recorder = Recorder::spawn(
        provider.clone(),
        MockEncoder::boxed(control),
        Box::new(tx),
        options,
    );
    (recorder, rx)
}

fn drain(events: &mut mpsc::UnboundedReceiver<RecorderEvent>) -> Vec<RecorderEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn durations(events: &[RecorderEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RecorderEvent::DurationUpdate(d) => Some(d.clone()),
            _ => None,
        })
        .collect()
}

fn completions(events: &[RecorderEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, RecorderEvent::Completed(_)))
        .count()
}

/// Wait until the driver has moved the session into a terminal state
async fn settle(recorder: &Recorder) {
    let mut watch = recorder.subscribe();
    let _ = watch.wait_for(|s| s.state.is_terminal()).await;
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test(start_paused = true)]
async fn three_second_take_completes_with_all_chunks() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    assert_eq!(recorder.state(), SessionState::Recording);

    control.chunk(b"c1").await;
    sleep(Duration::from_millis(1000)).await;
    control.chunk(b"c2").await;
    sleep(Duration::from_millis(1000)).await;
    control.chunk(b"c3").await;
    sleep(Duration::from_millis(1200)).await;

    recorder.stop().await;
    assert_eq!(recorder.state(), SessionState::Completed);

    let events = drain(&mut events);
    assert_eq!(durations(&events), vec!["0:00", "0:01", "0:02", "0:03"]);

    let artifact = events
        .iter()
        .find_map(|e| match e {
            RecorderEvent::Completed(a) => Some(a.clone()),
            _ => None,
        })
        .expect("completed artifact");
    assert_eq!(artifact.payload(), b"c1c2c3");
    assert_eq!(artifact.duration(), Duration::from_millis(3200));
    assert_eq!(artifact.mime_type(), "audio/L16;rate=16000;channels=1");
    assert_eq!(provider.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn flushed_tail_is_appended_last() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    control.set_tail(Ok(b"-tail".to_vec()));
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.chunk(b"body").await;
    sleep(Duration::from_millis(500)).await;
    recorder.stop().await;

    let events = drain(&mut events);
    match events.last() {
        Some(RecorderEvent::Completed(a)) => assert_eq!(a.payload(), b"body-tail"),
        other => panic!("expected completion, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn empty_chunks_are_ignored() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.chunk(b"").await;
    control.chunk(b"ab").await;
    control.chunk(b"").await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(recorder.snapshot().chunk_count, 1);

    recorder.stop().await;
    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, RecorderEvent::Completed(a) if a.payload() == b"ab")));
}

#[tokio::test(start_paused = true)]
async fn max_duration_stops_automatically() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let options = RecorderOptions {
        max_duration: Some(Duration::from_secs(2)),
    };
    let (recorder, mut events) = recorder(&provider, &control, options);

    recorder.start().await.unwrap();
    control.chunk(b"xy").await;
    sleep(Duration::from_secs(5)).await;

    assert_eq!(recorder.state(), SessionState::Completed);
    let events = drain(&mut events);
    assert_eq!(completions(&events), 1);
    match events.last() {
        Some(RecorderEvent::Completed(a)) => assert_eq!(a.duration(), Duration::from_secs(2)),
        other => panic!("expected completion, got {:?}", other),
    }
    assert_eq!(provider.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn each_recorder_starts_its_display_at_zero() {
    for _ in 0..2 {
        let provider = MockProvider::granting();
        let control = EncoderControl::new();
        let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

        recorder.start().await.unwrap();
        sleep(Duration::from_millis(1500)).await;
        recorder.stop().await;

        let events = drain(&mut events);
        assert_eq!(durations(&events), vec!["0:00", "0:01"]);
    }
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test(start_paused = true)]
async fn denied_microphone_fails_without_stream() {
    let provider = MockProvider::denying(CaptureError::PermissionDenied);
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    assert_eq!(recorder.start().await, Err(CaptureError::PermissionDenied));
    assert_eq!(
        recorder.state(),
        SessionState::Failed(CaptureError::PermissionDenied)
    );
    assert_eq!(control.started(), 0);
    assert_eq!(provider.released(), 0);

    let events = drain(&mut events);
    assert_eq!(completions(&events), 0);
    assert_eq!(
        events,
        vec![RecorderEvent::Failed(CaptureError::PermissionDenied)]
    );

    // Terminal: a later start reports the same failure
    assert_eq!(recorder.start().await, Err(CaptureError::PermissionDenied));
    assert_eq!(provider.acquired(), 1);
}

#[tokio::test(start_paused = true)]
async fn encoder_fault_discards_take_and_releases() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.chunk(b"c1").await;
    control
        .emit(EncoderEvent::Fault(CaptureError::DeviceUnavailable(
            "unplugged".into(),
        )))
        .await;
    settle(&recorder).await;

    assert!(matches!(
        recorder.state(),
        SessionState::Failed(CaptureError::DeviceUnavailable(_))
    ));
    assert_eq!(recorder.snapshot().chunk_count, 0);
    assert_eq!(provider.released(), 1);
    assert_eq!(control.aborted(), 1);

    // Stop after failure changes nothing
    recorder.stop().await;
    let events = drain(&mut events);
    assert_eq!(completions(&events), 0);
    assert_eq!(provider.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn closed_encoder_output_is_a_fault() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, _events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.close();
    settle(&recorder).await;

    assert!(matches!(
        recorder.state(),
        SessionState::Failed(CaptureError::EncoderFault(_))
    ));
    assert_eq!(provider.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn flush_error_fails_but_still_releases() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    control.set_tail(Err(CaptureError::EncoderFault("flush".into())));
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.chunk(b"c1").await;
    sleep(Duration::from_millis(100)).await;
    recorder.stop().await;

    assert_eq!(
        recorder.state(),
        SessionState::Failed(CaptureError::EncoderFault("flush".into()))
    );
    assert_eq!(provider.released(), 1);
    assert_eq!(completions(&drain(&mut events)), 0);
}

// =============================================================================
// Idempotence and cancellation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn second_start_is_a_no_op() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, _events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    recorder.start().await.unwrap();

    assert_eq!(provider.acquired(), 1);
    assert_eq!(control.started(), 1);
    assert_eq!(recorder.state(), SessionState::Recording);
}

#[tokio::test(start_paused = true)]
async fn second_stop_yields_one_completion() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.chunk(b"c1").await;
    sleep(Duration::from_millis(100)).await;
    recorder.stop().await;
    recorder.stop().await;

    assert_eq!(completions(&drain(&mut events)), 1);
    assert_eq!(provider.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_from_idle_does_nothing() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.stop().await;

    assert_eq!(recorder.state(), SessionState::Idle);
    assert!(drain(&mut events).is_empty());
    assert_eq!(provider.acquired(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_while_acquiring_cancels() {
    let provider = MockProvider::slow(Duration::from_secs(5));
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    let (started, ()) = tokio::join!(recorder.start(), async {
        sleep(Duration::from_millis(100)).await;
        recorder.stop().await;
    });

    assert_eq!(started, Err(CaptureError::Cancelled));
    assert_eq!(recorder.state(), SessionState::Failed(CaptureError::Cancelled));

    // The slow grant never turns into a recording
    sleep(Duration::from_secs(10)).await;
    assert_eq!(recorder.state(), SessionState::Failed(CaptureError::Cancelled));
    assert_eq!(control.started(), 0);
    assert_eq!(provider.released(), 0);

    let events = drain(&mut events);
    assert!(durations(&events).is_empty());
    assert_eq!(events, vec![RecorderEvent::Failed(CaptureError::Cancelled)]);
}

#[tokio::test(start_paused = true)]
async fn second_start_while_acquiring_waits_for_grant() {
    let provider = MockProvider::slow(Duration::from_secs(1));
    let control = EncoderControl::new();
    let (recorder, _events) = recorder(&provider, &control, RecorderOptions::default());

    let (first, second) = tokio::join!(recorder.start(), async {
        sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.state(), SessionState::Acquiring);
        let second = recorder.start().await;
        (second, recorder.state())
    });

    assert_eq!(first, Ok(()));
    assert_eq!(second, (Ok(()), SessionState::Recording));
    assert_eq!(provider.acquired(), 1);
    assert_eq!(control.started(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_start_while_acquiring_sees_denial() {
    let provider = MockProvider::slow_denial(Duration::from_secs(1), CaptureError::PermissionDenied);
    let control = EncoderControl::new();
    let (recorder, _events) = recorder(&provider, &control, RecorderOptions::default());

    let (first, second) = tokio::join!(recorder.start(), async {
        sleep(Duration::from_millis(100)).await;
        recorder.start().await
    });

    assert_eq!(first, Err(CaptureError::PermissionDenied));
    assert_eq!(second, Err(CaptureError::PermissionDenied));
    assert_eq!(provider.acquired(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_while_stopping_waits_for_the_same_flush() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.chunk(b"c1").await;
    sleep(Duration::from_millis(100)).await;
    tokio::join!(recorder.stop(), recorder.stop());

    assert_eq!(recorder.state(), SessionState::Completed);
    assert_eq!(completions(&drain(&mut events)), 1);
    assert_eq!(control.stopped(), 1);
}

// =============================================================================
// Flush that never finishes
// =============================================================================

#[tokio::test(start_paused = true)]
async fn dropping_recorder_while_stopping_releases_stream() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    control.hang_on_stop();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.chunk(b"c1").await;
    assert!(timeout(Duration::from_millis(50), recorder.stop()).await.is_err());
    assert_eq!(recorder.state(), SessionState::Stopping);
    assert_eq!(provider.released(), 0);

    drop(recorder);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(provider.released(), 1);
    assert_eq!(control.aborted(), 1);
    assert_eq!(completions(&drain(&mut events)), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_stopping_releases_stream() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    control.hang_on_stop();
    let (recorder, _events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    assert!(timeout(Duration::from_millis(50), recorder.stop()).await.is_err());
    recorder.shutdown().await;

    assert_eq!(provider.released(), 1);
    assert_eq!(control.aborted(), 1);
}

#[tokio::test(start_paused = true)]
async fn stuck_flush_fails_after_limit() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    control.hang_on_stop();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control.chunk(b"c1").await;
    sleep(Duration::from_millis(100)).await;
    recorder.stop().await;

    assert!(matches!(
        recorder.state(),
        SessionState::Failed(CaptureError::EncoderFault(_))
    ));
    assert_eq!(provider.released(), 1);
    assert_eq!(control.aborted(), 1);
    assert_eq!(completions(&drain(&mut events)), 0);
}

// =============================================================================
// Teardown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn dropping_recorder_releases_stream_once() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, mut events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    drop(recorder);
    sleep(Duration::from_millis(10)).await;

    assert_eq!(provider.released(), 1);
    assert_eq!(control.aborted(), 1);
    assert_eq!(completions(&drain(&mut events)), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_recording_releases_stream_once() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, _events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    recorder.shutdown().await;

    assert_eq!(provider.released(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_after_completion_does_not_release_again() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, _events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    sleep(Duration::from_millis(100)).await;
    recorder.stop().await;
    recorder.shutdown().await;

    assert_eq!(provider.released(), 1);
    assert_eq!(control.aborted(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_after_failure_does_not_release_again() {
    let provider = MockProvider::granting();
    let control = EncoderControl::new();
    let (recorder, _events) = recorder(&provider, &control, RecorderOptions::default());

    recorder.start().await.unwrap();
    control
        .emit(EncoderEvent::Fault(CaptureError::DeviceUnavailable(
            "unplugged".into(),
        )))
        .await;
    settle(&recorder).await;
    assert_eq!(provider.released(), 1);

    recorder.stop().await;
    recorder.shutdown().await;

    assert_eq!(provider.released(), 1);
    assert_eq!(control.aborted(), 1);
}
