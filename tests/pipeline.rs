//! End-to-end utterance handling with fake collaborators

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::body::Bytes;
use loa_gateway::Gateway;
use loa_gateway::handlers::Reply;
use loa_gateway::integrations::ChatModel;
use loa_gateway::session::{Session, SessionState};
use loa_gateway::voice::{
    AUDIO_STREAM_END, AUDIO_STREAM_START, END_OF_STREAM, Inbound, Pacer, ResponseSynthesizer,
    SynthesisOutcome, Transcriber, TranscriptionError, wav,
};

mod common;
use common::{FakeChat, FakeStt, FakeTts, FakeWeather, RecordingSink, gateway, services, write_wav};

const FRAME: &[u8] = &[1, 2, 3, 4];

fn fast_pacer() -> Pacer {
    Pacer {
        frame_bytes: 4096,
        frame_delay: Duration::ZERO,
        silence_bytes: 16,
        end_delay: Duration::ZERO,
    }
}

/// Send `frames` audio frames followed by the end marker
async fn say(gateway: &Gateway, session: &mut Session, sink: &mut RecordingSink, frames: usize) {
    for _ in 0..frames {
        let inbound = Inbound::from_binary(Bytes::from_static(FRAME), FRAME.len());
        gateway.handle_inbound(session, inbound, sink).await;
    }
    let end = Inbound::Control(END_OF_STREAM.to_string());
    gateway.handle_inbound(session, end, sink).await;
}

#[tokio::test]
async fn failed_sentence_is_skipped_in_order() {
    let tts = Arc::new(FakeTts::new().fail("Hai"));
    let synthesizer = ResponseSynthesizer::new(tts, Duration::from_secs(1));
    let mut sink = RecordingSink::new();

    let outcome = synthesizer.speak("Một. Hai. Ba.", &mut sink, &fast_pacer()).await;

    assert_eq!(outcome, SynthesisOutcome::Completed { emitted: 2, skipped: 1 });
    assert_eq!(sink.texts(), [AUDIO_STREAM_START, AUDIO_STREAM_END]);
    assert_eq!(sink.audio_text(), "Một.Ba.");
}

#[tokio::test(start_paused = true)]
async fn segments_follow_sentence_order_not_completion_order() {
    let tts = FakeTts::new()
        .delay("Một", Duration::from_millis(300))
        .delay("Hai", Duration::from_millis(100));
    let synthesizer = ResponseSynthesizer::new(Arc::new(tts), Duration::from_secs(1));
    let mut sink = RecordingSink::new();

    let outcome = synthesizer
        .speak("Một. Hai. Ba. Bốn.", &mut sink, &fast_pacer())
        .await;

    assert_eq!(outcome, SynthesisOutcome::Completed { emitted: 4, skipped: 0 });
    assert_eq!(sink.audio_text(), "Một.Hai.Ba.Bốn.");
}

#[tokio::test(start_paused = true)]
async fn slow_sentence_times_out_and_is_skipped() {
    let tts = FakeTts::new().delay("chậm", Duration::from_secs(5));
    let synthesizer = ResponseSynthesizer::new(Arc::new(tts), Duration::from_secs(1));
    let mut sink = RecordingSink::new();

    let outcome = synthesizer
        .speak("Câu chậm. Câu nhanh.", &mut sink, &fast_pacer())
        .await;

    assert_eq!(outcome, SynthesisOutcome::Completed { emitted: 1, skipped: 1 });
    assert_eq!(sink.audio_text(), "Câu nhanh.");
}

#[tokio::test]
async fn client_leaving_after_start_stops_the_response() {
    let synthesizer = ResponseSynthesizer::new(Arc::new(FakeTts::new()), Duration::from_secs(1));
    let mut sink = RecordingSink::closing_after_texts(1);

    let outcome = synthesizer.speak("Một. Hai.", &mut sink, &fast_pacer()).await;

    assert_eq!(outcome, SynthesisOutcome::Interrupted);
    assert_eq!(sink.texts(), [AUDIO_STREAM_START]);
    assert!(sink.audio().is_empty());
}

#[tokio::test]
async fn all_sentences_failing_sends_nothing() {
    let synthesizer =
        ResponseSynthesizer::new(Arc::new(FakeTts::new().fail("Một").fail("Hai")), Duration::from_secs(1));
    let mut sink = RecordingSink::new();

    let outcome = synthesizer.speak("Một. Hai.", &mut sink, &fast_pacer()).await;

    assert_eq!(outcome, SynthesisOutcome::NothingSynthesized);
    assert!(sink.sent.is_empty());
}

#[tokio::test]
async fn nothing_synthesized_plays_the_timeout_recording() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(
        dir.path(),
        services(FakeStt::hearing(""), FakeTts::new().fail("")),
    );
    let mut sink = RecordingSink::new();

    gateway.deliver(Reply::Speak("Xin chào.".to_string()), &mut sink).await;

    assert_eq!(sink.texts(), [AUDIO_STREAM_START, AUDIO_STREAM_END]);
    assert_eq!(sink.audio_text(), "speech_timeout");
}

#[tokio::test]
async fn welcome_then_listening() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(dir.path(), services(FakeStt::hearing(""), FakeTts::new()));
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    assert_eq!(session.state, SessionState::Connected);
    gateway.welcome(&mut session, &mut sink).await;

    assert_eq!(session.state, SessionState::Listening);
    assert_eq!(sink.texts(), [AUDIO_STREAM_START, AUDIO_STREAM_END]);
    assert_eq!(sink.audio_text(), "welcome");
}

#[tokio::test]
async fn utterance_is_transcribed_and_answered() {
    let dir = tempfile::tempdir().unwrap();
    let stt = Arc::new(FakeStt::hearing("Bây giờ là mấy giờ?"));
    let mut services = services(FakeStt::hearing(""), FakeTts::new());
    services.stt = Arc::clone(&stt) as Arc<dyn Transcriber>;
    let gateway = gateway(dir.path(), services);
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 3).await;

    assert_eq!(stt.calls.load(Ordering::SeqCst), 1);
    assert_eq!(stt.last_len.load(Ordering::SeqCst), wav::HEADER_LEN + 3 * FRAME.len());
    assert!(sink.audio_text().starts_with("Bây giờ là "), "{}", sink.audio_text());
    assert_eq!(sink.texts(), [AUDIO_STREAM_START, AUDIO_STREAM_END]);
    assert!(session.ingest.is_empty());
    assert_eq!(session.state, SessionState::Listening);
}

#[tokio::test]
async fn oversized_utterance_is_capped() {
    let dir = tempfile::tempdir().unwrap();
    let stt = Arc::new(FakeStt::hearing("mấy giờ rồi"));
    let mut services = services(FakeStt::hearing(""), FakeTts::new());
    services.stt = Arc::clone(&stt) as Arc<dyn Transcriber>;
    let gateway = gateway(dir.path(), services);
    let max = gateway.config().audio.max_utterance_frames;
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, max + 5).await;

    assert_eq!(stt.last_len.load(Ordering::SeqCst), wav::HEADER_LEN + max * FRAME.len());
}

#[tokio::test]
async fn failed_transcription_plays_not_heard_and_resets() {
    let dir = tempfile::tempdir().unwrap();
    let stt = Arc::new(FakeStt::failing(TranscriptionError::ServiceBusy("503".to_string())));
    let mut services = services(FakeStt::hearing(""), FakeTts::new());
    services.stt = Arc::clone(&stt) as Arc<dyn Transcriber>;
    let gateway = gateway(dir.path(), services);
    let mut session = gateway.new_session();

    let mut first = RecordingSink::new();
    say(&gateway, &mut session, &mut first, 2).await;
    assert_eq!(first.audio_text(), "not_heard");
    assert!(session.ingest.is_empty());

    // the next utterance starts from an empty buffer
    let mut second = RecordingSink::new();
    say(&gateway, &mut session, &mut second, 1).await;
    assert_eq!(stt.last_len.load(Ordering::SeqCst), wav::HEADER_LEN + FRAME.len());
    assert_eq!(stt.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_utterance_skips_transcription() {
    let dir = tempfile::tempdir().unwrap();
    let stt = Arc::new(FakeStt::hearing("mấy giờ rồi"));
    let mut services = services(FakeStt::hearing(""), FakeTts::new());
    services.stt = Arc::clone(&stt) as Arc<dyn Transcriber>;
    let gateway = gateway(dir.path(), services);
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 0).await;

    assert_eq!(stt.calls.load(Ordering::SeqCst), 0);
    assert_eq!(sink.audio_text(), "not_heard");
}

#[tokio::test]
async fn short_binary_message_is_not_audio() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(dir.path(), services(FakeStt::hearing(""), FakeTts::new()));
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    let inbound = Inbound::from_binary(Bytes::from_static(&[1, 2]), FRAME.len());
    gateway.handle_inbound(&mut session, inbound, &mut sink).await;

    assert!(session.ingest.is_empty());
    assert!(sink.sent.is_empty());
}

#[tokio::test]
async fn binary_end_marker_ends_the_utterance() {
    let dir = tempfile::tempdir().unwrap();
    let stt = Arc::new(FakeStt::hearing("mấy giờ rồi"));
    let mut services = services(FakeStt::hearing(""), FakeTts::new());
    services.stt = Arc::clone(&stt) as Arc<dyn Transcriber>;
    let gateway = gateway(dir.path(), services);
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    let frame = Inbound::from_binary(Bytes::from_static(FRAME), FRAME.len());
    gateway.handle_inbound(&mut session, frame, &mut sink).await;
    let end = Inbound::from_binary(Bytes::from_static(b"END_OF_STREAM"), FRAME.len());
    gateway.handle_inbound(&mut session, end, &mut sink).await;

    assert_eq!(stt.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn named_song_is_streamed() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(
        dir.path(),
        services(FakeStt::hearing("Bật bài hát Lạc Trôi"), FakeTts::new()),
    );
    write_wav(&gateway.config().assets.music_dir.join("lac_troi.wav"));
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 1).await;

    assert_eq!(sink.texts(), [AUDIO_STREAM_START, AUDIO_STREAM_END]);
    assert_eq!(sink.audio_text(), "lac_troi");
}

#[tokio::test]
async fn unknown_song_plays_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(
        dir.path(),
        services(FakeStt::hearing("phát nhạc bài không tồn tại"), FakeTts::new()),
    );
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 1).await;

    assert_eq!(sink.audio_text(), "song_not_found");
}

#[tokio::test]
async fn weather_defaults_to_home_location() {
    let dir = tempfile::tempdir().unwrap();
    let weather = Arc::new(FakeWeather::with("Hanoi", "trời nắng", 30.0));
    let mut services = services(FakeStt::hearing("thời tiết hôm nay thế nào"), FakeTts::new());
    services.weather = Arc::clone(&weather) as Arc<dyn loa_gateway::integrations::WeatherProvider>;
    let gateway = gateway(dir.path(), services);
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 1).await;

    assert_eq!(*weather.queried.lock().unwrap(), ["Hanoi"]);
    assert!(sink.audio_text().starts_with("Thời tiết hiện tại ở Hanoi: trời nắng."));
}

#[tokio::test]
async fn weather_failure_plays_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(
        dir.path(),
        services(FakeStt::hearing("thời tiết ở đà nẵng"), FakeTts::new()),
    );
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 1).await;

    assert_eq!(sink.audio_text(), "weather_unavailable");
}

#[tokio::test]
async fn conversation_is_remembered_across_utterances() {
    let dir = tempfile::tempdir().unwrap();
    let chat = Arc::new(FakeChat::answering("Chào bạn."));
    let mut services = services(FakeStt::hearing("kể cho tôi nghe về biển"), FakeTts::new());
    services.chat = Arc::clone(&chat) as Arc<dyn ChatModel>;
    let gateway = gateway(dir.path(), services);
    let mut session = gateway.new_session();

    let mut sink = RecordingSink::new();
    say(&gateway, &mut session, &mut sink, 1).await;
    assert_eq!(sink.audio_text(), "Chào bạn.");

    let mut sink = RecordingSink::new();
    say(&gateway, &mut session, &mut sink, 1).await;

    assert_eq!(*chat.histories.lock().unwrap(), [0, 2]);
    assert_eq!(session.conversation.len(), 4);
}

#[tokio::test]
async fn chat_failure_plays_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let mut services = services(FakeStt::hearing("kể cho tôi nghe về biển"), FakeTts::new());
    services.chat = Arc::new(FakeChat::failing()) as Arc<dyn ChatModel>;
    let gateway = gateway(dir.path(), services);
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 1).await;

    assert_eq!(sink.audio_text(), "chat_unavailable");
    assert!(session.conversation.is_empty());
}

#[tokio::test]
async fn lunar_date_is_spoken() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(
        dir.path(),
        services(FakeStt::hearing("hôm nay là ngày bao nhiêu âm lịch"), FakeTts::new()),
    );
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 1).await;

    assert_eq!(sink.audio_text(), "Hôm nay là ngày 15 tháng 8 năm Giáp Thìn âm lịch.");
}

#[tokio::test]
async fn introduction_plays_a_recording() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(dir.path(), services(FakeStt::hearing("bạn là ai"), FakeTts::new()));
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    say(&gateway, &mut session, &mut sink, 1).await;

    assert!(sink.audio_text().starts_with("intro_"), "{}", sink.audio_text());
}

#[tokio::test]
async fn missing_asset_is_reported_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = gateway(dir.path(), services(FakeStt::hearing(""), FakeTts::new()));
    std::fs::remove_file(gateway.config().assets.dir.join("welcome.wav")).unwrap();
    let mut session = gateway.new_session();
    let mut sink = RecordingSink::new();

    gateway.welcome(&mut session, &mut sink).await;

    assert_eq!(sink.texts(), ["Error: audio asset unavailable (welcome.wav)"]);
}
