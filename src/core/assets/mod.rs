pub mod asset_index;
pub mod reconcile;

pub use asset_index::{AssetIndex, AssetObject};
pub use reconcile::AssetReconciler;
