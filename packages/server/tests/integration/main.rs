mod assets;
mod auth;
mod common;
mod health;
