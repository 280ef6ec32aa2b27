pub mod oauth2;
pub mod well_known;
