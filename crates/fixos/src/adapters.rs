pub mod audio;
pub mod guide;
pub mod shops;

pub use audio::{AudioAnalysis, AudioAnalyzer};
pub use guide::{GuideClient, GuideLookup, GuideStep, RepairGuide};
pub use shops::{haversine_km, Shop, ShopFinder, ShopQuery};
