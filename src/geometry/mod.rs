//! Geometry builders for the globe scene

pub mod beacon;
pub mod country;
pub mod globe;
pub mod trace;
pub mod triangulate;

pub use beacon::Beacon;
pub use country::CountryMesh;
pub use globe::Globe;
pub use trace::Trace;
