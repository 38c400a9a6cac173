use anyhow::Result;
use fixos::adapters::{AudioAnalyzer, GuideClient, ShopFinder};

use crate::configuration::Settings;

/// Shared application state: one client per upstream, built at startup.
/// The analyzer is absent when no API key is configured; the route
/// reports that rather than failing server startup.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Option<AudioAnalyzer>,
    pub shops: ShopFinder,
    pub guide: GuideClient,
}

impl AppState {
    pub fn new(settings: &Settings) -> Result<Self> {
        let analyzer = match &settings.analyzer.api_key {
            Some(api_key) => Some(AudioAnalyzer::new(
                settings.analyzer.host.clone(),
                settings.analyzer.model.clone(),
                api_key.clone(),
            )?),
            None => None,
        };

        Ok(Self {
            analyzer,
            shops: ShopFinder::new(
                settings.shops.geocode_host.clone(),
                settings.shops.overpass_host.clone(),
            )?,
            guide: GuideClient::new(settings.guide.host.clone())?,
        })
    }
}
