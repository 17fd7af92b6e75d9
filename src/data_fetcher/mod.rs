pub mod api;
pub mod cache;
pub mod models;
pub mod processors;

pub use api::{HvwSourceClient, LeagueSource};
pub use cache::{CacheStore, InMemoryCacheStore};
pub use models::{Class, Game, Table, TableScore, Week, WeekId};
