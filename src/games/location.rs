//! The location guessing game.
//!
//! A picture from the catalog is posted and every player gets five guesses of where
//! it was taken. Guesses are geocoded and scored by their distance to the place.
//! Each guess cuts the remaining time to thirty seconds. When the countdown runs
//! out the closest guess wins and all guesses are written to the match log.

use std::{sync::Arc, time::Duration};

use log::{debug, info, warn};
use mockall::automock;
use rand::seq::IndexedRandom;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tokio::sync::Mutex;

use crate::games::{
    GameError,
    engine::{GuessOutcome, RoundEngine},
    normalize::normalize_answer,
    session::{GuessRecord, Place, Variant},
    store::JsonFile,
};

/// Mean radius of the earth used for distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Length of a location round.
pub const ROUND_TIME: Duration = Duration::from_secs(150);

/// A point on the globe, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Great-circle distance between two points, using the haversine formula.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Resolves free text to coordinates.
#[automock]
pub trait Geocoder {
    /// Coordinates of the best match for `query`, if any.
    async fn resolve(&self, query: &str) -> Option<Coordinates>;
}

/// Client of the OpenCage geocoding API.
pub struct OpenCageGeocoder {
    /// Base url of the API
    url: String,
    api_key: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    lat: f64,
    lng: f64,
}

impl OpenCageGeocoder {
    pub fn new(url: &str, api_key: &str) -> Self {
        OpenCageGeocoder {
            url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: Client::new(),
        }
    }

    async fn request(&self, query: &str) -> Result<GeocodeResponse, reqwest::Error> {
        let url = format!("{}/geocode/v1/json", self.url);
        debug!("request {}?q={}", url, query);

        self.client
            .get(&url)
            .query(&[
                ("q", query),
                ("key", self.api_key.as_str()),
                ("language", "en"),
                ("no_annotations", "1"),
                ("limit", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

impl Geocoder for OpenCageGeocoder {
    async fn resolve(&self, query: &str) -> Option<Coordinates> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }

        match self.request(query).await {
            Ok(response) => response.results.first().map(|result| Coordinates {
                lat: result.geometry.lat,
                lon: result.geometry.lng,
            }),
            Err(e) => {
                warn!("failed to geocode {}: {}", query, e);
                None
            }
        }
    }
}

/// Pictures the location game picks from.
pub struct LocationCatalog {
    places: Mutex<Vec<Place>>,
    file: JsonFile,
}

impl LocationCatalog {
    pub async fn new(path: String) -> Self {
        let file = JsonFile::new(path);
        let places = file.load().await;

        LocationCatalog {
            places: Mutex::new(places),
            file,
        }
    }

    /// Adds `place`, replacing the entry with the same image.
    ///
    /// # Returns
    ///
    /// `true` if an entry was replaced.
    pub async fn add(&self, place: Place) -> bool {
        let mut places = self.places.lock().await;

        match places.iter_mut().find(|p| p.image_url == place.image_url) {
            Some(existing) => {
                *existing = place;
                true
            }
            None => {
                places.push(place);
                false
            }
        }
    }

    /// Removes the entry showing `image_url`.
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed.
    pub async fn remove(&self, image_url: &str) -> bool {
        let mut places = self.places.lock().await;
        let before = places.len();
        places.retain(|p| p.image_url != image_url);
        places.len() != before
    }

    /// A random entry, `None` if the catalog is empty.
    pub async fn random(&self) -> Option<Place> {
        let places = self.places.lock().await;
        places.choose(&mut rand::rng()).cloned()
    }

    pub async fn persist(&self) -> Result<(), GameError> {
        let places = self.places.lock().await;
        self.file.persist(&*places).await
    }
}

/// A location round as stored in the match log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// `YYYYMMDD_n`, `n` counting the matches of the day from 1
    pub match_id: String,
    pub channel: String,
    pub location: String,
}

/// A guess as stored in the match log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchGuess {
    pub match_id: String,
    pub record: GuessRecord,
    /// Name of the place the guess was about
    pub match_location: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MatchLogData {
    matches: Vec<MatchSummary>,
    guesses: Vec<MatchGuess>,
}

/// History of location rounds.
pub struct MatchLog {
    data: Mutex<MatchLogData>,
    file: JsonFile,
}

impl MatchLog {
    pub async fn new(path: String) -> Self {
        let file = JsonFile::new(path);
        let data = file.load().await;

        MatchLog {
            data: Mutex::new(data),
            file,
        }
    }

    /// Registers a new match played on `date` and returns its id.
    pub async fn register(&self, date: Date, channel: &str, location: &str) -> String {
        let mut data = self.data.lock().await;

        let prefix = format!(
            "{:04}{:02}{:02}_",
            date.year(),
            u8::from(date.month()),
            date.day()
        );
        let played_today = data
            .matches
            .iter()
            .filter(|m| m.match_id.starts_with(&prefix))
            .count();
        let match_id = format!("{}{}", prefix, played_today + 1);

        data.matches.push(MatchSummary {
            match_id: match_id.clone(),
            channel: channel.to_string(),
            location: location.to_string(),
        });

        match_id
    }

    /// Appends the guesses of a finished match.
    pub async fn record_guesses(&self, match_id: &str, location: &str, guesses: Vec<GuessRecord>) {
        let mut data = self.data.lock().await;

        data.guesses
            .extend(guesses.into_iter().map(|record| MatchGuess {
                match_id: match_id.to_string(),
                record,
                match_location: location.to_string(),
            }));
    }

    /// Ids of the matches that have recorded guesses, oldest first.
    pub async fn match_ids(&self) -> Vec<String> {
        let data = self.data.lock().await;

        let mut ids: Vec<String> = Vec::new();
        for guess in &data.guesses {
            if !ids.contains(&guess.match_id) {
                ids.push(guess.match_id.clone());
            }
        }
        ids
    }

    /// Guesses of match `match_id`, closest first.
    pub async fn guesses(&self, match_id: &str) -> Vec<MatchGuess> {
        let data = self.data.lock().await;

        let mut guesses: Vec<MatchGuess> = data
            .guesses
            .iter()
            .filter(|g| g.match_id == match_id)
            .cloned()
            .collect();
        guesses.sort_by(|a, b| a.record.distance_km.total_cmp(&b.record.distance_km));
        guesses
    }

    pub async fn persist(&self) -> Result<(), GameError> {
        let data = self.data.lock().await;
        self.file.persist(&*data).await
    }
}

/// A started location round, as shown to the room.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationStart {
    pub match_id: String,
    pub image_url: String,
    pub attempt_budget: u32,
    pub time_limit_secs: u64,
}

/// The location game of every room.
pub struct GeoGame<G: Geocoder> {
    engine: RoundEngine,
    geocoder: G,
    catalog: Arc<LocationCatalog>,
    match_log: Arc<MatchLog>,
}

impl<G: Geocoder> GeoGame<G> {
    pub fn new(
        engine: RoundEngine,
        geocoder: G,
        catalog: Arc<LocationCatalog>,
        match_log: Arc<MatchLog>,
    ) -> Self {
        GeoGame {
            engine,
            geocoder,
            catalog,
            match_log,
        }
    }

    /// Starts a round in `channel` with a random catalog entry.
    ///
    /// # Errors
    ///
    /// - [`GameError::AlreadyActive`] if the room is busy
    /// - [`GameError::NoLocations`] if the catalog is empty
    pub async fn start(&self, channel: &str) -> Result<LocationStart, GameError> {
        let id = self.engine.reserve(channel).await?;

        let Some(place) = self.catalog.random().await else {
            self.engine.abandon(channel, id).await;
            return Err(GameError::NoLocations);
        };

        let today = OffsetDateTime::now_utc().date();
        let match_id = self.match_log.register(today, channel, &place.name).await;
        let image_url = place.image_url.clone();

        self.engine
            .activate_location(channel, id, match_id.clone(), place, ROUND_TIME)
            .await?;

        Ok(LocationStart {
            match_id,
            image_url,
            attempt_budget: Variant::Location.attempt_budget(),
            time_limit_secs: ROUND_TIME.as_secs(),
        })
    }

    /// Submits `user`'s guess of the place.
    ///
    /// The guess is checked against the round before geocoding, so guesses that
    /// would be rejected anyway don't reach the geocoder. A guess that can't be
    /// geocoded does not count.
    ///
    /// # Errors
    ///
    /// - [`GameError::NoActiveRound`] if no location round is running
    /// - [`GameError::AttemptBudgetExceeded`] if `user` has no guesses left
    /// - [`GameError::DuplicateGuess`] if `user` already made this guess
    /// - [`GameError::GeocodeUnavailable`] if the guess can't be geocoded
    pub async fn guess(
        &self,
        channel: &str,
        user: &str,
        raw_guess: &str,
    ) -> Result<GuessOutcome, GameError> {
        let guess = normalize_answer(raw_guess);
        let id = self.engine.check_location_guess(channel, user, &guess).await?;

        let coordinates = self
            .geocoder
            .resolve(&guess)
            .await
            .ok_or_else(|| GameError::GeocodeUnavailable(guess.clone()))?;

        self.engine
            .commit_location_guess(channel, id, user, &guess, coordinates)
            .await
    }

    /// Adds a catalog entry, geocoding `name` for its coordinates.
    ///
    /// # Errors
    ///
    /// - [`GameError::InvalidImageUrl`] if `image_url` is not an http(s) URL
    /// - [`GameError::GeocodeUnavailable`] if `name` can't be geocoded
    /// - [`GameError::Persistence`] if the catalog can't be written
    pub async fn add_location(&self, image_url: &str, name: &str) -> Result<Place, GameError> {
        let valid = Url::parse(image_url)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            return Err(GameError::InvalidImageUrl(image_url.to_string()));
        }

        let coordinates = self
            .geocoder
            .resolve(name)
            .await
            .ok_or_else(|| GameError::GeocodeUnavailable(name.to_string()))?;

        let place = Place {
            image_url: image_url.to_string(),
            name: name.trim().to_string(),
            lat: coordinates.lat,
            lon: coordinates.lon,
        };
        let replaced = self.catalog.add(place.clone()).await;
        self.catalog.persist().await?;

        info!(
            "{} location {} at {:?}",
            if replaced { "replaced" } else { "added" },
            place.name,
            coordinates
        );
        Ok(place)
    }

    /// Removes the catalog entry showing `image_url`.
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed.
    pub async fn remove_location(&self, image_url: &str) -> Result<bool, GameError> {
        let removed = self.catalog.remove(image_url).await;
        if removed {
            self.catalog.persist().await?;
            info!("removed location {}", image_url);
        }
        Ok(removed)
    }

    /// Ids of the matches with recorded guesses.
    pub async fn match_ids(&self) -> Vec<String> {
        self.match_log.match_ids().await
    }

    /// Guesses of match `match_id`, closest first.
    pub async fn match_guesses(&self, match_id: &str) -> Vec<MatchGuess> {
        self.match_log.guesses(match_id).await
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use tempfile::TempDir;
    use time::macros::date;
    use tokio::sync::mpsc;

    use super::*;
    use crate::{games::leaderboard::LeaderboardStore, utils::get_path};

    const ROOM: &str = "!room:example.com";

    fn place(image_url: &str, name: &str) -> Place {
        Place {
            image_url: image_url.to_string(),
            name: name.to_string(),
            lat: 52.52,
            lon: 13.405,
        }
    }

    async fn game<G: Geocoder>(geocoder: G, dir: &TempDir) -> GeoGame<G> {
        let data_path = dir.path().to_str().unwrap();
        let (announcer, _) = mpsc::unbounded_channel();
        let match_log = Arc::new(MatchLog::new(get_path(data_path, "matches")).await);
        let engine = RoundEngine::new(
            Arc::new(LeaderboardStore::new(get_path(data_path, "leaderboard")).await),
            Arc::clone(&match_log),
            announcer,
        );
        let catalog = Arc::new(LocationCatalog::new(get_path(data_path, "locations")).await);

        GeoGame::new(engine, geocoder, catalog, match_log)
    }

    #[test]
    fn test_haversine_known_distance() {
        let berlin = Coordinates {
            lat: 52.5200,
            lon: 13.4050,
        };
        let paris = Coordinates {
            lat: 48.8566,
            lon: 2.3522,
        };

        let distance = haversine_km(berlin, paris);

        assert!((distance - 878.0).abs() < 5.0, "distance was {}", distance);
        assert_eq!(haversine_km(berlin, berlin), 0.0);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let a = Coordinates {
            lat: -33.8688,
            lon: 151.2093,
        };
        let b = Coordinates {
            lat: 40.7128,
            lon: -74.0060,
        };

        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_open_cage_resolve() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let body = r#"{"results": [{"geometry": {"lat": 52.5170365, "lng": 13.3888599}}]}"#;

        server
            .mock("GET", "/geocode/v1/json")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("q".to_owned(), "berlin".to_owned()),
                mockito::Matcher::UrlEncoded("key".to_owned(), "secret".to_owned()),
                mockito::Matcher::UrlEncoded("limit".to_owned(), "1".to_owned()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let geocoder = OpenCageGeocoder::new(&url, "secret");
        let coordinates = geocoder.resolve(" berlin ").await.unwrap();

        assert_eq!(coordinates.lat, 52.5170365);
        assert_eq!(coordinates.lon, 13.3888599);
    }

    #[tokio::test]
    async fn test_open_cage_without_results() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        server
            .mock("GET", "/geocode/v1/json")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"results": []}"#)
            .create_async()
            .await;

        let geocoder = OpenCageGeocoder::new(&url, "secret");

        assert!(geocoder.resolve("nowhere at all").await.is_none());
        assert!(geocoder.resolve("   ").await.is_none());
    }

    #[tokio::test]
    async fn test_open_cage_error_status() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        server
            .mock("GET", "/geocode/v1/json")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let geocoder = OpenCageGeocoder::new(&url, "wrong");

        assert!(geocoder.resolve("berlin").await.is_none());
    }

    #[tokio::test]
    async fn test_catalog_add_replace_remove() {
        let catalog = LocationCatalog::new("nonexistent_locations".to_string()).await;

        assert!(catalog.random().await.is_none());
        assert!(!catalog.add(place("https://i.imgur.com/a.jpg", "Berlin")).await);
        assert!(catalog.add(place("https://i.imgur.com/a.jpg", "Paris")).await);
        assert_eq!(catalog.random().await.unwrap().name, "Paris");

        assert!(catalog.remove("https://i.imgur.com/a.jpg").await);
        assert!(!catalog.remove("https://i.imgur.com/a.jpg").await);
        assert!(catalog.random().await.is_none());
    }

    #[tokio::test]
    async fn test_match_ids_count_per_day() {
        let match_log = MatchLog::new("nonexistent_matches".to_string()).await;

        let first = match_log.register(date!(2024 - 03 - 09), ROOM, "Berlin").await;
        let second = match_log.register(date!(2024 - 03 - 09), ROOM, "Paris").await;
        let next_day = match_log.register(date!(2024 - 03 - 10), ROOM, "Rome").await;

        assert_eq!(first, "20240309_1");
        assert_eq!(second, "20240309_2");
        assert_eq!(next_day, "20240310_1");
    }

    #[tokio::test]
    async fn test_match_log_lists_guesses() {
        let match_log = MatchLog::new("nonexistent_matches".to_string()).await;
        let record = |user: &str, distance_km: f64| GuessRecord {
            channel: ROOM.to_string(),
            user: user.to_string(),
            guess: "somewhere".to_string(),
            distance_km,
        };

        match_log
            .record_guesses("20240309_1", "Berlin", vec![record("a", 9.0), record("b", 2.0)])
            .await;
        match_log
            .record_guesses("20240309_2", "Paris", vec![record("c", 1.0)])
            .await;

        assert_eq!(match_log.match_ids().await, vec!["20240309_1", "20240309_2"]);
        let guesses = match_log.guesses("20240309_1").await;
        assert_eq!(guesses.len(), 2);
        assert_eq!(guesses[0].record.user, "b");
        assert_eq!(guesses[0].match_location, "Berlin");
        assert!(match_log.guesses("20240309_3").await.is_empty());
    }

    #[tokio::test]
    async fn test_start_without_locations() {
        let dir = TempDir::new().unwrap();
        let game = game(MockGeocoder::new(), &dir).await;

        assert_eq!(game.start(ROOM).await, Err(GameError::NoLocations));
        assert!(!game.engine.is_busy(ROOM).await);
    }

    #[tokio::test]
    async fn test_start_and_guess() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_resolve()
            .with(eq("potsdam"))
            .times(1)
            .returning(|_| {
                Some(Coordinates {
                    lat: 52.3906,
                    lon: 13.0645,
                })
            });
        let game = game(geocoder, &dir).await;
        game.catalog
            .add(place("https://i.imgur.com/a.jpg", "Berlin"))
            .await;

        let start = game.start(ROOM).await.unwrap();
        assert_eq!(start.image_url, "https://i.imgur.com/a.jpg");
        assert_eq!(start.time_limit_secs, 150);
        assert_eq!(start.attempt_budget, 5);
        assert!(start.match_id.ends_with("_1"));

        let outcome = game.guess(ROOM, "alice", " Potsdam ").await.unwrap();
        let GuessOutcome::Recorded {
            guess,
            distance_km,
            clamped,
            ..
        } = outcome
        else {
            panic!("expected a recorded guess");
        };
        assert_eq!(guess, "potsdam");
        assert!(distance_km > 20.0 && distance_km < 30.0);
        assert!(clamped);
    }

    #[tokio::test]
    async fn test_ungeocodable_guess_is_not_counted() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_resolve()
            .with(eq("asdfgh"))
            .times(1)
            .returning(|_| None);
        geocoder
            .expect_resolve()
            .with(eq("berlin"))
            .times(1)
            .returning(|_| Some(Coordinates { lat: 52.52, lon: 13.405 }));
        let game = game(geocoder, &dir).await;
        game.catalog
            .add(place("https://i.imgur.com/a.jpg", "Berlin"))
            .await;
        game.start(ROOM).await.unwrap();

        assert_eq!(
            game.guess(ROOM, "alice", "asdfgh").await,
            Err(GameError::GeocodeUnavailable("asdfgh".to_string()))
        );

        let outcome = game.guess(ROOM, "alice", "berlin").await.unwrap();
        assert!(matches!(outcome, GuessOutcome::Recorded { distance_km, .. } if distance_km < 0.01));
    }

    #[tokio::test]
    async fn test_rejected_guess_skips_geocoder() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_resolve().never();
        let game = game(geocoder, &dir).await;

        assert_eq!(
            game.guess(ROOM, "alice", "berlin").await,
            Err(GameError::NoActiveRound(ROOM.to_string()))
        );
    }

    #[tokio::test]
    async fn test_add_location() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = MockGeocoder::new();
        geocoder
            .expect_resolve()
            .with(eq("Eiffel Tower"))
            .times(1)
            .returning(|_| Some(Coordinates { lat: 48.8584, lon: 2.2945 }));
        let game = game(geocoder, &dir).await;

        let place = game
            .add_location("https://i.imgur.com/tower.jpg", "Eiffel Tower")
            .await
            .unwrap();

        assert_eq!(place.lat, 48.8584);
        assert_eq!(game.catalog.random().await, Some(place));
        assert!(
            game.remove_location("https://i.imgur.com/tower.jpg")
                .await
                .unwrap()
        );
        assert!(
            !game
                .remove_location("https://i.imgur.com/tower.jpg")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_add_location_rejects_invalid_url() {
        let dir = TempDir::new().unwrap();
        let mut geocoder = MockGeocoder::new();
        geocoder.expect_resolve().never();
        let game = game(geocoder, &dir).await;

        for url in ["not a url", "ftp://example.com/a.jpg"] {
            assert_eq!(
                game.add_location(url, "Berlin").await,
                Err(GameError::InvalidImageUrl(url.to_string()))
            );
        }
    }
}
