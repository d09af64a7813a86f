use std::{collections::HashMap, fmt, fs::File, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use axum::body::Bytes;
use cucumber::{given, then, when, World as _};
use itinera::{
    config::AppConfig,
    db::init_pool,
    error::AppError,
    models::{
        featured::{Featured, FeaturedPayload},
        trip::{ProgramPayload, Trip},
    },
    services::{featured as featured_banners, media::MediaStore, programs},
    state::AppState,
    submission::{FeaturedSubmission, ProgramSubmission, UploadedFile},
};
use tempfile::TempDir;

const PUBLIC_BASE: &str = "http://media.test/media/";

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    trip_ids: HashMap<String, String>,
    old_images: Vec<String>,
    kept_images: Vec<String>,
    banner: Option<Featured>,
    last_error: Option<String>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn trip_id(&self, title: &str) -> &str {
        self.trip_ids
            .get(title)
            .unwrap_or_else(|| panic!("no stored trip named {title}"))
    }

    async fn fetch_trip(&self, title: &str) -> Trip {
        self.app_state()
            .trips
            .get(self.trip_id(title))
            .await
            .expect("fetch trip")
            .expect("trip must exist")
    }

    fn record(&mut self, outcome: Result<Trip, AppError>, title: &str) {
        match outcome {
            Ok(trip) => {
                self.trip_ids.insert(title.to_string(), trip.id);
                self.last_error = None;
            }
            Err(err) => self.last_error = Some(err.to_string()),
        }
    }

    fn media_root(&self) -> PathBuf {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .media_root
            .clone()
    }

    fn media_path(&self, url: &str) -> PathBuf {
        let relative = url
            .strip_prefix(PUBLIC_BASE)
            .unwrap_or_else(|| panic!("{url} is not a media url"));
        self.media_root().join(relative)
    }

    fn media_object_count(&self) -> usize {
        count_files(&self.media_root())
    }
}

struct TestState {
    app: AppState,
    media_root: PathBuf,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let media_root = root.path().join("media");

        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            media_root: media_root.clone(),
            public_base_url: PUBLIC_BASE.parse()?,
            admin_token: "bdd-admin-token".into(),
            max_upload_bytes: 1024 * 1024,
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let media = MediaStore::new(config.media_root.clone(), config.public_base_url.clone());
        media.ensure_structure().await?;

        let app = AppState::new(config, db, media);
        Ok(Self {
            app,
            media_root,
            _root: root,
        })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

fn count_files(dir: &PathBuf) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

fn image(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.into(),
        content_type: Some("image/jpeg".into()),
        bytes: Bytes::from_static(b"fake-jpeg-bytes"),
    }
}

fn gallery(count: usize) -> Vec<UploadedFile> {
    (0..count).map(|idx| image(&format!("g{idx}.jpg"))).collect()
}

fn base_payload(title: &str, days: i64, from_date: &str) -> ProgramPayload {
    let json = serde_json::json!({
        "title": title,
        "description": format!("<p>{title} description</p>"),
        "origin": "Casablanca",
        "destination": "Merzouga",
        "days": days,
        "basePrice": 499.0,
        "fromDate": from_date,
        "priceIncludes": "<ul><li>Transport</li></ul>",
        "conditions": "<p>Non-refundable</p>",
        "timeline": (1..=days)
            .map(|day| serde_json::json!({
                "title": format!("Day {day}"),
                "description": "<p>Guided day</p>"
            }))
            .collect::<Vec<_>>(),
    });
    serde_json::from_value(json).expect("payload builds")
}

fn submission(payload: ProgramPayload) -> ProgramSubmission {
    ProgramSubmission {
        payload,
        gallery: Vec::new(),
        timeline_images: Vec::new(),
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.trip_ids.clear();
    world.old_images.clear();
    world.kept_images.clear();
    world.banner = None;
    world.last_error = None;
}

#[given(regex = r#"^a stored program "([^"]+)" with (\d+) gallery images?$"#)]
async fn given_stored_program(world: &mut AppWorld, title: String, image_count: usize) {
    let mut submission = submission(base_payload(&title, 3, "2025-05-01"));
    submission.gallery = gallery(image_count);
    let trip = programs::create_program(world.app_state(), submission)
        .await
        .expect("create program");
    world.trip_ids.insert(title, trip.id);
}

#[given(regex = r#"^a stored hidden program "([^"]+)"$"#)]
async fn given_stored_hidden_program(world: &mut AppWorld, title: String) {
    let mut payload = base_payload(&title, 3, "2025-05-01");
    payload.display = false;
    let trip = programs::create_program(world.app_state(), submission(payload))
        .await
        .expect("create hidden program");
    world.trip_ids.insert(title, trip.id);
}

#[when(regex = r#"^I submit a new program "([^"]+)" lasting (\d+) days starting "([^"]+)"$"#)]
async fn when_submit_program(world: &mut AppWorld, title: String, days: i64, from_date: String) {
    let outcome =
        programs::create_program(world.app_state(), submission(base_payload(&title, days, &from_date)))
            .await;
    world.record(outcome, &title);
}

#[when(
    regex = r#"^I submit a new program "([^"]+)" lasting (\d+) days starting "([^"]+)" with timeline images for days (\d+) and (\d+)$"#
)]
async fn when_submit_program_with_timeline_images(
    world: &mut AppWorld,
    title: String,
    days: i64,
    from_date: String,
    first_day: usize,
    second_day: usize,
) {
    let mut submission = submission(base_payload(&title, days, &from_date));
    submission.timeline_images = vec![
        (first_day - 1, image("t-first.jpg")),
        (second_day - 1, image("t-second.jpg")),
    ];
    let outcome = programs::create_program(world.app_state(), submission).await;
    world.record(outcome, &title);
}

#[when("I submit a program without a title")]
async fn when_submit_without_title(world: &mut AppWorld) {
    let mut payload = base_payload("ignored", 3, "2025-05-01");
    payload.title = None;
    let outcome = programs::create_program(world.app_state(), submission(payload)).await;
    world.record(outcome, "ignored");
}

#[when(regex = r#"^I submit a program with start date "([^"]+)" and one gallery image$"#)]
async fn when_submit_bad_start_date(world: &mut AppWorld, from_date: String) {
    let mut submission = submission(base_payload("Broken Dates", 3, &from_date));
    submission.gallery = gallery(1);
    let outcome = programs::create_program(world.app_state(), submission).await;
    world.record(outcome, "Broken Dates");
}

#[when(regex = r#"^I submit a new program "([^"]+)" with (\d+) gallery images$"#)]
async fn when_submit_program_with_gallery(world: &mut AppWorld, title: String, image_count: usize) {
    let mut submission = submission(base_payload(&title, 3, "2025-05-01"));
    submission.gallery = gallery(image_count);
    let outcome = programs::create_program(world.app_state(), submission).await;
    world.record(outcome, &title);
}

#[when("the database goes away")]
async fn when_database_goes_away(world: &mut AppWorld) {
    world.app_state().db.close().await;
}

#[when(
    regex = r#"^I update "([^"]+)" keeping gallery images (\d+) and (\d+) and uploading (\d+) new images?$"#
)]
async fn when_update_keeping(
    world: &mut AppWorld,
    title: String,
    first_kept: usize,
    second_kept: usize,
    new_count: usize,
) {
    let trip = world.fetch_trip(&title).await;
    world.old_images = trip.images.clone();
    world.kept_images = vec![
        trip.images[first_kept - 1].clone(),
        trip.images[second_kept - 1].clone(),
    ];

    let mut payload = base_payload(&title, 3, "2025-05-01");
    payload.kept_images = Some(world.kept_images.clone());
    let mut submission = submission(payload);
    submission.gallery = gallery(new_count);

    let outcome = programs::update_program(world.app_state(), &trip.id, submission).await;
    world.record(outcome, &title);
}

#[when(regex = r#"^I update "([^"]+)" uploading (\d+) new gallery images? without a kept list$"#)]
async fn when_update_replacing(world: &mut AppWorld, title: String, new_count: usize) {
    let trip = world.fetch_trip(&title).await;
    world.old_images = trip.images.clone();

    let mut submission = submission(base_payload(&title, 3, "2025-05-01"));
    submission.gallery = gallery(new_count);

    let outcome = programs::update_program(world.app_state(), &trip.id, submission).await;
    world.record(outcome, &title);
}

#[when(regex = r#"^I update "([^"]+)" without touching the gallery$"#)]
async fn when_update_untouched(world: &mut AppWorld, title: String) {
    let trip = world.fetch_trip(&title).await;
    world.old_images = trip.images.clone();

    let outcome = programs::update_program(
        world.app_state(),
        &trip.id,
        submission(base_payload(&title, 3, "2025-05-01")),
    )
    .await;
    world.record(outcome, &title);
}

#[when(regex = r#"^I delete the program "([^"]+)"$"#)]
async fn when_delete_program(world: &mut AppWorld, title: String) {
    let id = world.trip_id(&title).to_string();
    programs::delete_program(world.app_state(), &id)
        .await
        .expect("delete program");
}

#[when(regex = r#"^I create a featured banner for "([^"]+)" with label "([^"]+)"$"#)]
async fn when_create_banner(world: &mut AppWorld, title: String, label: String) {
    let submission = FeaturedSubmission {
        payload: FeaturedPayload {
            trip_id: Some(world.trip_id(&title).to_string()),
            cta_label: Some(label),
        },
        banner: Some(image("banner.jpg")),
    };
    let banner = featured_banners::create_banner(world.app_state(), submission)
        .await
        .expect("create banner");
    world.banner = Some(banner);
}

#[when("I create a featured banner for a missing trip")]
async fn when_create_banner_missing_trip(world: &mut AppWorld) {
    let submission = FeaturedSubmission {
        payload: FeaturedPayload {
            trip_id: Some("no-such-trip".into()),
            cta_label: Some("Book now".into()),
        },
        banner: Some(image("banner.jpg")),
    };
    match featured_banners::create_banner(world.app_state(), submission).await {
        Ok(_) => panic!("banner for a missing trip must be rejected"),
        Err(err) => world.last_error = Some(err.to_string()),
    }
}

#[when("I delete the featured banner")]
async fn when_delete_banner(world: &mut AppWorld) {
    let id = world.banner.as_ref().expect("banner created").id.clone();
    featured_banners::delete_banner(world.app_state(), &id)
        .await
        .expect("delete banner");
}

#[then(regex = r#"^the stored program "([^"]+)" runs from "([^"]+)" to "([^"]+)"$"#)]
async fn then_program_dates(world: &mut AppWorld, title: String, from_date: String, to_date: String) {
    let trip = world.fetch_trip(&title).await;
    assert_eq!(trip.from_date.to_string(), from_date);
    assert_eq!(trip.to_date.to_string(), to_date);
}

#[then(regex = r#"^the stored program "([^"]+)" has (\d+) timeline entries in ascending order$"#)]
async fn then_timeline_ordered(world: &mut AppWorld, title: String, expected: usize) {
    let trip = world.fetch_trip(&title).await;
    assert_eq!(trip.timeline.len(), expected);
    for (idx, entry) in trip.timeline.iter().enumerate() {
        assert_eq!(entry.sort_order, (idx + 1) as i64);
        let expected_date = trip.from_date + chrono::Days::new(idx as u64);
        assert_eq!(entry.entry_date, expected_date);
    }
}

#[then(regex = r#"^timeline day (\d+) of "([^"]+)" has an image$"#)]
async fn then_timeline_day_has_image(world: &mut AppWorld, day: usize, title: String) {
    let trip = world.fetch_trip(&title).await;
    let entry = &trip.timeline[day - 1];
    let url = entry.image.as_ref().expect("day should carry an image");
    assert!(world.media_path(url).exists());
}

#[then(regex = r#"^timeline day (\d+) of "([^"]+)" has no image$"#)]
async fn then_timeline_day_has_no_image(world: &mut AppWorld, day: usize, title: String) {
    let trip = world.fetch_trip(&title).await;
    assert!(trip.timeline[day - 1].image.is_none());
}

#[then(regex = r#"^the submission is rejected with "([^"]+)"$"#)]
async fn then_rejected_with(world: &mut AppWorld, fragment: String) {
    let message = world.last_error.as_ref().expect("an error was expected");
    assert!(
        message.contains(&fragment),
        "expected {message:?} to mention {fragment:?}"
    );
}

#[then("the submission fails")]
async fn then_submission_fails(world: &mut AppWorld) {
    assert!(world.last_error.is_some());
}

#[then("no media objects are stored")]
async fn then_no_media_objects(world: &mut AppWorld) {
    assert_eq!(world.media_object_count(), 0);
}

#[then(regex = r#"^the program "([^"]+)" has (\d+) gallery images?$"#)]
async fn then_gallery_count(world: &mut AppWorld, title: String, expected: usize) {
    let trip = world.fetch_trip(&title).await;
    assert_eq!(trip.images.len(), expected);
}

#[then("the kept images come first in their original order")]
async fn then_kept_images_first(world: &mut AppWorld) {
    let title = world
        .trip_ids
        .keys()
        .next()
        .expect("one trip in play")
        .clone();
    let trip = world.fetch_trip(&title).await;
    assert_eq!(&trip.images[..world.kept_images.len()], &world.kept_images);
}

#[then("the dropped gallery images are eventually removed from media storage")]
async fn then_dropped_images_swept(world: &mut AppWorld) {
    let title = world
        .trip_ids
        .keys()
        .next()
        .expect("one trip in play")
        .clone();
    let trip = world.fetch_trip(&title).await;
    let dropped: Vec<String> = world
        .old_images
        .iter()
        .filter(|url| !trip.images.contains(url))
        .cloned()
        .collect();
    assert!(!dropped.is_empty(), "scenario should drop at least one image");

    for _ in 0..40 {
        if dropped.iter().all(|url| !world.media_path(url).exists()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    for url in &dropped {
        assert!(!world.media_path(url).exists(), "{url} should be swept");
    }
    for url in &trip.images {
        assert!(world.media_path(url).exists(), "{url} should survive");
    }
}

#[then(regex = r#"^the public program list contains only "([^"]+)"$"#)]
async fn then_public_list_only(world: &mut AppWorld, title: String) {
    let titles: Vec<String> = world
        .app_state()
        .trips
        .list(false)
        .await
        .expect("list trips")
        .into_iter()
        .map(|trip| trip.title)
        .collect();
    assert_eq!(titles, vec![title]);
}

#[then(regex = r#"^the program "([^"]+)" can still be fetched by id$"#)]
async fn then_fetchable_by_id(world: &mut AppWorld, title: String) {
    let trip = world.fetch_trip(&title).await;
    assert_eq!(trip.title, title);
}

#[then(regex = r#"^deleting the program "([^"]+)" again reports not found$"#)]
async fn then_second_delete_not_found(world: &mut AppWorld, title: String) {
    let id = world.trip_id(&title).to_string();
    let err = programs::delete_program(world.app_state(), &id)
        .await
        .expect_err("second delete must fail");
    assert!(matches!(err, AppError::NotFound));
}

#[then(regex = r#"^the featured list has (\d+) banners?$"#)]
async fn then_featured_count(world: &mut AppWorld, expected: usize) {
    let banners = featured_banners::list_banners(world.app_state())
        .await
        .expect("list banners");
    assert_eq!(banners.len(), expected);
}

#[then("the banner image is removed from media storage")]
async fn then_banner_image_removed(world: &mut AppWorld) {
    let banner = world.banner.as_ref().expect("banner created");
    assert!(!world.media_path(&banner.image).exists());
}

#[then(regex = r#"^the banner is rejected with "([^"]+)"$"#)]
async fn then_banner_rejected(world: &mut AppWorld, fragment: String) {
    let message = world.last_error.as_ref().expect("an error was expected");
    assert!(
        message.contains(&fragment),
        "expected {message:?} to mention {fragment:?}"
    );
}

#[then(regex = r#"^the program "([^"]+)" still exists$"#)]
async fn then_program_still_exists(world: &mut AppWorld, title: String) {
    let trip = world.fetch_trip(&title).await;
    assert_eq!(trip.title, title);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
