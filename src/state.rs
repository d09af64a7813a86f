use crate::{
    auth,
    config::AppConfig,
    db::DbPool,
    services::{media::MediaStore, trips::TripStore},
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub media: MediaStore,
    pub trips: TripStore,
    pub admin_token_digest: Vec<u8>,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, media: MediaStore) -> Self {
        let admin_token_digest = auth::token_digest(&config.admin_token);
        let trips = TripStore::new(db.clone());
        Self {
            config,
            db,
            media,
            trips,
            admin_token_digest,
        }
    }
}
