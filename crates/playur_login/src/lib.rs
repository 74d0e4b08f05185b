//! # PlayUR Login
//!
//! Login and registration flow for games on the PlayUR platform.
//!
//! [`LoginController`] drives the screens; it talks to the server through
//! [`LoginService`] and remembers the player through a
//! [`CredentialStore`](playur_core::traits::CredentialStore). On the web the
//! hosting page hands over credentials as JSON ([`BrowserLogin`]).

pub mod bridge;
pub mod controller;
pub mod store;

pub use bridge::BrowserLogin;
pub use controller::{
    DEFAULT_CANCEL_MESSAGE, ErrorDialog, FormResult, LOGIN_FAILED_MESSAGE, LoginController,
    LoginError, LoginService, PERSIST_KEY_PREFIX, RegisterForm, Screen, StartAction,
};
pub use store::{FileCredentialStore, MemoryCredentialStore};
