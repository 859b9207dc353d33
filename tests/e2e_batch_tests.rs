//! End-to-end tests for batch runs over a song library
//!
//! The library lives in a temporary directory and the external tools are
//! replaced by the fakes in `common`, so the whole pipeline runs in-process:
//! discovery, extraction, fetch, normalization, tagging and write-back.

mod common;

use common::{
    description_with_url, FakeFetchEngine, FakeLoudnessTool, FakeResponse, SongLibrary,
    TestBatch, LOUDNESS_MARKER, MP3_BYTES, VIDEO_ID_1, VIDEO_ID_2, VIDEO_ID_3,
};
use id3::{Tag, TagLike};
use tokio_util::sync::CancellationToken;
use usdx_fetch::batch::{exit_code, render_summary, SongStatus, StageReport, StatusCounts};
use usdx_fetch::fetch::FetchErrorKind;

#[tokio::test]
async fn test_downloads_audio_next_to_description() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.status(), SongStatus::Downloaded);
    assert_eq!(outcome.reference().unwrap().id, VIDEO_ID_1);
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(batch.engine.calls(), vec![VIDEO_ID_1.to_string()]);

    let audio = outcome.audio().unwrap();
    assert_eq!(audio.path, library.folder("Band - Song").join("Band - Song.mp3"));
    assert!(audio.path.exists());
    assert_eq!(
        library.files("Band - Song"),
        vec!["Band - Song.mp3".to_string(), "Band - Song.txt".to_string()]
    );
    assert!(library.hidden_entries("Band - Song").is_empty());
    assert_eq!(exit_code(&outcomes), 0);
}

#[tokio::test]
async fn test_second_run_skips_without_fetching() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let engine = FakeFetchEngine::new();
    let batch = TestBatch::new(engine.clone());

    let first = batch.run(&library).await;
    assert_eq!(first[0].status(), SongStatus::Downloaded);

    let second = batch.run(&library).await;
    assert_eq!(second[0].status(), SongStatus::Skipped);
    assert_eq!(
        second[0].skip_reason(),
        Some("audio already present: Band - Song.mp3")
    );
    // only the first run reached the engine
    assert_eq!(engine.calls().len(), 1);
    assert_eq!(exit_code(&second), 0);
}

#[tokio::test]
async fn test_existing_audio_skips_even_without_reference() {
    let library = SongLibrary::new();
    library.add_song("Lyrics Only", "#TITLE:Lyrics Only\n#ARTIST:Nobody\n: 0 1 0 la\nE\n");
    library.add_file("Lyrics Only", "Lyrics Only.ogg", b"OggS");
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].status(), SongStatus::Skipped);
    assert!(batch.engine.calls().is_empty());
}

#[tokio::test]
async fn test_overwrite_replaces_existing_audio() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    library.add_file("Band - Song", "Band - Song.m4a", b"old audio");
    let batch = TestBatch::new(FakeFetchEngine::new()).with_overwrite();

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].status(), SongStatus::Downloaded);
    assert_eq!(
        library.files("Band - Song"),
        vec!["Band - Song.mp3".to_string(), "Band - Song.txt".to_string()]
    );
}

#[tokio::test]
async fn test_failures_are_isolated_per_song() {
    let library = SongLibrary::new();
    library.add_song("A - First", &description_with_url(VIDEO_ID_1));
    library.add_song("B - Second", &description_with_url(VIDEO_ID_2));
    library.add_song("C - Third", &description_with_url(VIDEO_ID_3));
    let engine = FakeFetchEngine::new();
    engine.respond(VIDEO_ID_2, FakeResponse::Fail(FetchErrorKind::NotFound));
    let batch = TestBatch::new(engine.clone());

    let outcomes = batch.run(&library).await;

    let names: Vec<String> = outcomes.iter().map(|o| o.name()).collect();
    assert_eq!(names, vec!["A - First", "B - Second", "C - Third"]);
    assert_eq!(outcomes[0].status(), SongStatus::Downloaded);
    assert_eq!(outcomes[1].status(), SongStatus::Failed);
    assert_eq!(outcomes[2].status(), SongStatus::Downloaded);

    let failure = outcomes[1].failure().unwrap();
    assert_eq!(failure.category(), "not-found");
    assert!(failure.diagnostic().contains(VIDEO_ID_2));
    assert!(library.hidden_entries("B - Second").is_empty());
    assert_eq!(exit_code(&outcomes), 1);
}

#[tokio::test]
async fn test_folder_without_single_description_is_ambiguous() {
    let library = SongLibrary::new();
    library.add_song("Two Descriptions", &description_with_url(VIDEO_ID_1));
    library.add_file("Two Descriptions", "duet.txt", description_with_url(VIDEO_ID_2).as_bytes());
    std::fs::create_dir(library.folder("Empty")).unwrap();
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert_eq!(outcome.status(), SongStatus::Failed);
        assert_eq!(outcome.failure().unwrap().category(), "folder-ambiguous");
    }
    assert!(batch.engine.calls().is_empty());
}

#[tokio::test]
async fn test_lyrics_only_description_fails_extraction() {
    let library = SongLibrary::new();
    library.add_song(
        "Lyrics Only",
        "#TITLE:Lyrics Only\n#ARTIST:Nobody\n: 0 4 60 These\n: 5 4 60 words\nE\n",
    );
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].status(), SongStatus::Failed);
    assert_eq!(
        outcomes[0].failure().unwrap().category(),
        "extraction-not-found"
    );
    assert!(outcomes[0].reference().is_none());
    assert!(batch.engine.calls().is_empty());
}

#[tokio::test]
async fn test_cp1252_description_is_read() {
    let library = SongLibrary::new();
    let folder = library.folder("Beyonce - Halo");
    std::fs::create_dir(&folder).unwrap();
    let mut bytes = b"#TITLE:Halo\n#ARTIST:Beyonc".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(format!("\n#COMMENT:youtu.be/{}\nE\n", VIDEO_ID_1).as_bytes());
    std::fs::write(folder.join("Beyonce - Halo.txt"), &bytes).unwrap();
    let batch = TestBatch::new(FakeFetchEngine::new()).without_description_update();

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].status(), SongStatus::Downloaded);
    let tag = Tag::read_from_path(&outcomes[0].audio().unwrap().path).unwrap();
    assert_eq!(tag.artist(), Some("Beyonc\u{e9}"));
    // the legacy-encoded document is left alone
    assert_eq!(std::fs::read(folder.join("Beyonce - Halo.txt")).unwrap(), bytes);
}

#[tokio::test]
async fn test_invalid_artifact_fails_and_cleans_staging() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let engine = FakeFetchEngine::new();
    engine.respond(VIDEO_ID_1, FakeResponse::Empty);
    let batch = TestBatch::new(engine);

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].status(), SongStatus::Failed);
    assert_eq!(outcomes[0].failure().unwrap().category(), "invalid-artifact");
    assert_eq!(library.files("Band - Song"), vec!["Band - Song.txt".to_string()]);
    assert!(library.hidden_entries("Band - Song").is_empty());
}

#[tokio::test]
async fn test_engine_choice_of_format_is_kept() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let engine = FakeFetchEngine::new();
    engine.respond(
        VIDEO_ID_1,
        FakeResponse::Produce {
            extension: "opus",
            bytes: b"OggS opus".to_vec(),
        },
    );
    let batch = TestBatch::new(engine);

    let outcomes = batch.run(&library).await;

    let outcome = &outcomes[0];
    assert_eq!(outcome.status(), SongStatus::Downloaded);
    assert!(outcome.audio().unwrap().path.ends_with("Band - Song.opus"));
    // ID3 applies to MP3 only
    assert_eq!(outcome.id3_tags(), &StageReport::NotRun);
    assert!(library
        .read_description("Band - Song")
        .contains("#MP3:Band - Song.opus\n"));
}

#[tokio::test]
async fn test_normalization_marks_song_tagged() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let loudness = FakeLoudnessTool::new();
    let batch = TestBatch::new(FakeFetchEngine::new()).with_loudness(loudness.clone());

    let outcomes = batch.run(&library).await;

    let outcome = &outcomes[0];
    assert_eq!(outcome.status(), SongStatus::Tagged);
    assert_eq!(outcome.normalization(), &StageReport::Succeeded);
    assert_eq!(loudness.call_count(), 1);

    let bytes = std::fs::read(&outcome.audio().unwrap().path).unwrap();
    assert!(bytes.ends_with(LOUDNESS_MARKER));
    assert!(library.hidden_entries("Band - Song").is_empty());
}

#[tokio::test]
async fn test_normalization_failure_keeps_downloaded_artifact() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let batch = TestBatch::new(FakeFetchEngine::new())
        .with_loudness(FakeLoudnessTool::failing())
        .without_description_update();

    let outcomes = batch.run(&library).await;

    let outcome = &outcomes[0];
    assert_eq!(outcome.status(), SongStatus::Downloaded);
    assert!(outcome.normalization().failure().is_some());
    assert!(!outcome.status().is_failure());

    let bytes = std::fs::read(&outcome.audio().unwrap().path).unwrap();
    assert!(!bytes.ends_with(LOUDNESS_MARKER));
    assert!(bytes.ends_with(MP3_BYTES));
    assert!(library.hidden_entries("Band - Song").is_empty());
    assert_eq!(exit_code(&outcomes), 0);
}

#[tokio::test]
async fn test_mp3_gets_tags_from_description() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].id3_tags(), &StageReport::Succeeded);
    let tag = Tag::read_from_path(&outcomes[0].audio().unwrap().path).unwrap();
    assert_eq!(tag.title(), Some("Song"));
    assert_eq!(tag.artist(), Some("Band"));
}

#[tokio::test]
async fn test_description_points_at_downloaded_file() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].description_update(), &StageReport::Succeeded);
    let text = library.read_description("Band - Song");
    assert!(text.starts_with("#TITLE:Song\n#ARTIST:Band\n"));
    assert!(text.contains("#VIDEO:v=dQw4w9WgXcQ\n#MP3:Band - Song.mp3\n: 0 4 60 Hel\n"));
    // notes are untouched
    assert!(text.ends_with(&format!(
        "E\nsource: https://www.youtube.com/watch?v={}\n",
        VIDEO_ID_1
    )));
}

#[tokio::test]
async fn test_cp1252_description_is_written_back_as_cp1252() {
    let library = SongLibrary::new();
    let folder = library.folder("Beyonce - Halo");
    std::fs::create_dir(&folder).unwrap();
    let mut bytes = b"#ENCODING:CP1252\n#TITLE:Halo\n#ARTIST:Beyonc\xE9".to_vec();
    bytes.extend_from_slice(format!("\n#VIDEO:v={}\nE\n", VIDEO_ID_1).as_bytes());
    std::fs::write(folder.join("Beyonce - Halo.txt"), &bytes).unwrap();
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].description_update(), &StageReport::Succeeded);
    let mut expected = b"#ENCODING:CP1252\n#TITLE:Halo\n#ARTIST:Beyonc\xE9".to_vec();
    expected.extend_from_slice(
        format!("\n#VIDEO:v={}\n#MP3:Beyonce - Halo.mp3\nE\n", VIDEO_ID_1).as_bytes(),
    );
    assert_eq!(std::fs::read(folder.join("Beyonce - Halo.txt")).unwrap(), expected);
}

#[tokio::test]
async fn test_folder_image_becomes_cover() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    library.add_file("Band - Song", "Band - Song [CO].jpg", b"jpeg");
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].cover(), &StageReport::Succeeded);
    let text = library.read_description("Band - Song");
    assert!(text.contains(
        "#MP3:Band - Song.mp3\n#COVER:Band - Song [CO].jpg\n#BACKGROUND:Band - Song [CO].jpg\n"
    ));
}

#[tokio::test]
async fn test_video_only_folder_is_downloaded() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    library.add_file("Band - Song", "Band - Song.webm", b"video");
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].status(), SongStatus::Downloaded);
    assert_eq!(batch.engine.calls(), vec![VIDEO_ID_1.to_string()]);
    assert_eq!(
        library.files("Band - Song"),
        vec![
            "Band - Song.mp3".to_string(),
            "Band - Song.txt".to_string(),
            "Band - Song.webm".to_string()
        ]
    );
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let engine = FakeFetchEngine::new();
    engine.respond(VIDEO_ID_1, FakeResponse::Fail(FetchErrorKind::Network));
    engine.respond(VIDEO_ID_1, FakeResponse::Fail(FetchErrorKind::RateLimited));
    let batch = TestBatch::new(engine.clone()).with_retries(
        3,
        vec![FetchErrorKind::Network, FetchErrorKind::RateLimited],
    );

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].status(), SongStatus::Downloaded);
    assert_eq!(outcomes[0].attempts(), 3);
    assert_eq!(engine.calls().len(), 3);
}

#[tokio::test]
async fn test_only_configured_categories_are_retried() {
    let library = SongLibrary::new();
    library.add_song("A - Timeout", &description_with_url(VIDEO_ID_1));
    library.add_song("B - Gone", &description_with_url(VIDEO_ID_2));
    let engine = FakeFetchEngine::new();
    engine.respond(VIDEO_ID_1, FakeResponse::Fail(FetchErrorKind::Timeout));
    engine.respond(VIDEO_ID_2, FakeResponse::Fail(FetchErrorKind::NotFound));
    let batch = TestBatch::new(engine.clone()).with_retries(2, vec![FetchErrorKind::Network]);

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].failure().unwrap().category(), "timeout");
    assert_eq!(outcomes[0].attempts(), 1);
    assert_eq!(outcomes[1].failure().unwrap().category(), "not-found");
    assert_eq!(outcomes[1].attempts(), 1);
    assert_eq!(engine.calls().len(), 2);
}

#[tokio::test]
async fn test_no_retries_by_default() {
    let library = SongLibrary::new();
    library.add_song("Band - Song", &description_with_url(VIDEO_ID_1));
    let engine = FakeFetchEngine::new();
    engine.respond(VIDEO_ID_1, FakeResponse::Fail(FetchErrorKind::Network));
    let batch = TestBatch::new(engine.clone());

    let outcomes = batch.run(&library).await;

    assert_eq!(outcomes[0].failure().unwrap().category(), "network");
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn test_cancellation_returns_partial_results() {
    let library = SongLibrary::new();
    library.add_song("A - First", &description_with_url(VIDEO_ID_1));
    library.add_song("B - Second", &description_with_url(VIDEO_ID_2));
    library.add_song("C - Third", &description_with_url(VIDEO_ID_3));
    let engine = FakeFetchEngine::new();
    let cancel = CancellationToken::new();
    engine.cancel_on_call(2, cancel.clone());
    let batch = TestBatch::new(engine.clone()).with_retries(3, vec![FetchErrorKind::Network]);

    let outcomes = batch.run_with_cancel(&library, &cancel).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].status(), SongStatus::Downloaded);
    assert_eq!(outcomes[1].status(), SongStatus::Failed);
    assert_eq!(outcomes[1].failure().unwrap().category(), "interrupted");
    assert_eq!(engine.calls().len(), 2);
    assert!(library.hidden_entries("B - Second").is_empty());
    assert_eq!(library.files("C - Third"), vec!["C - Third.txt".to_string()]);
    assert_eq!(exit_code(&outcomes), 1);
}

#[tokio::test]
async fn test_summary_counts_every_song_once() {
    let library = SongLibrary::new();
    library.add_song("A - Downloaded", &description_with_url(VIDEO_ID_1));
    library.add_song("B - Skipped", &description_with_url(VIDEO_ID_2));
    library.add_file("B - Skipped", "B - Skipped.mp3", MP3_BYTES);
    library.add_song("C - Failed", "#TITLE:C\n#ARTIST:Failed\nE\n");
    let batch = TestBatch::new(FakeFetchEngine::new());

    let outcomes = batch.run(&library).await;

    let counts = StatusCounts::from_outcomes(&outcomes);
    assert_eq!(counts.downloaded, 1);
    assert_eq!(counts.skipped, 1);
    assert_eq!(counts.failed, 1);
    assert_eq!(counts.tagged, 0);
    assert_eq!(counts.total(), 3);

    let summary = render_summary(&outcomes);
    assert!(summary.contains("A - Downloaded"));
    assert!(summary.contains("B - Skipped"));
    assert!(summary.contains("extraction-not-found"));
}

#[tokio::test]
async fn test_missing_root_is_an_error() {
    let library = SongLibrary::new();
    let batch = TestBatch::new(FakeFetchEngine::new());

    let result = batch
        .runner()
        .run(&library.root().join("missing"), &CancellationToken::new())
        .await;

    assert!(result.is_err());
}
