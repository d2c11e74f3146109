pub mod events;
pub mod health;
pub mod internal;
pub mod jobs;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;
