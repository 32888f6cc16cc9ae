pub mod armor;
pub mod artefact;
pub mod build;
pub mod container;
pub mod item;
pub mod password_reset_token;
pub mod refresh_token;
pub mod tag;
pub mod user;

#[cfg(test)]
pub(crate) mod test_fixtures;
