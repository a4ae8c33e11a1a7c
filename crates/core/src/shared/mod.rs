pub mod asset_resolver;
pub mod constants;
pub mod frame;
pub mod region;
pub mod vertex;
