use crate::bridge::BrowserLogin;
use playur_client::{ApiResponse, PlayurClient, PlayurClientError, Registration};
use playur_core::prelude::*;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

/// Prefix of every key written to the credential store.
pub const PERSIST_KEY_PREFIX: &str = "playur_";

pub const DEFAULT_CANCEL_MESSAGE: &str = "Could not login. Contact the researcher.";
pub const LOGIN_FAILED_MESSAGE: &str = "Incorrect Username or Password";
pub const MIN_PASSWORD_LENGTH: usize = 3;

fn key(name: &str) -> String {
    format!("{PERSIST_KEY_PREFIX}{name}")
}

/// Account calls the controller needs. Implemented by [`PlayurClient`].
pub trait LoginService: Send + Sync {
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<ApiResponse, PlayurClientError>> + Send;

    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<ApiResponse, PlayurClientError>> + Send;
}

impl LoginService for PlayurClient {
    async fn login(&self, username: &str, password: &str) -> Result<ApiResponse, PlayurClientError> {
        PlayurClient::login(self, username, password).await
    }

    async fn register(&self, registration: &Registration) -> Result<ApiResponse, PlayurClientError> {
        PlayurClient::register(self, registration).await
    }
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error(transparent)]
    Client(#[from] PlayurClientError),

    #[error("Invalid login payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Register,
}

/// Result of a login or registration attempt the server answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormResult {
    /// Logged in; the game should load `scene`.
    LoggedIn { scene: u32 },
    /// Rejected with feedback text for the user.
    Rejected(String),
}

/// What `start` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartAction {
    /// Stored credentials were used.
    AutoLogin(FormResult),
    /// The form is hidden until the web page supplies credentials.
    AwaitingBrowser,
    /// The login form is shown.
    ShowForm,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegisterForm {
    /// Client-side checks, in the order the user sees them.
    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() {
            Err("No username entered".into())
        } else if self.email.is_empty() {
            Err("No email entered".into())
        } else if self.password != self.confirm_password {
            Err("Passwords entered do not match!".into())
        } else if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            Err("Password too short!".into())
        } else {
            Ok(())
        }
    }

    fn registration(&self) -> Registration {
        Registration {
            username: self.username.clone(),
            password: self.password.clone(),
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDialog {
    pub title: String,
    pub message: String,
    pub dismissible: bool,
}

/// Login and registration screens.
///
/// The controller is owned by whatever hosts the UI. Auto-login and the
/// feedback message set by [`cancel_login`](Self::cancel_login) live on the
/// controller, so they carry over to the next [`start`](Self::start).
pub struct LoginController<S: LoginService, C: CredentialStore> {
    service: S,
    store: C,
    capabilities: Capabilities,
    start_scene: u32,

    screen: Screen,
    visible: bool,
    pub username: String,
    pub password: String,
    /// Password used for the next attempt: typed, stored or sent by the page.
    pending_password: String,
    feedback: String,
    pub register_form: RegisterForm,
    register_feedback: String,
    error: Option<ErrorDialog>,

    logged_in: bool,
    auto_login: bool,
    persisted_feedback: Option<String>,

    browser_info: Option<Value>,
    requested_experiment: Option<i64>,
    requested_experiment_group: Option<i64>,
}

impl<S: LoginService, C: CredentialStore> LoginController<S, C> {
    pub fn new(service: S, store: C, capabilities: Capabilities) -> Self {
        Self {
            service,
            store,
            capabilities,
            start_scene: 0,
            screen: Screen::Login,
            visible: false,
            username: String::new(),
            password: String::new(),
            pending_password: String::new(),
            feedback: String::new(),
            register_form: RegisterForm::default(),
            register_feedback: String::new(),
            error: None,
            logged_in: false,
            auto_login: true,
            persisted_feedback: None,
            browser_info: None,
            requested_experiment: None,
            requested_experiment_group: None,
        }
    }

    /// Scene the player came from. `0` sends them to scene 1 after login.
    pub fn with_start_scene(mut self, scene: u32) -> Self {
        self.start_scene = scene;
        self
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn register_feedback(&self) -> &str {
        &self.register_feedback
    }

    pub fn error(&self) -> Option<&ErrorDialog> {
        self.error.as_ref()
    }

    pub fn browser_info(&self) -> Option<&Value> {
        self.browser_info.as_ref()
    }

    pub fn requested_experiment(&self) -> Option<i64> {
        self.requested_experiment
    }

    pub fn requested_experiment_group(&self) -> Option<i64> {
        self.requested_experiment_group
    }

    fn persist(&self, name: &str, value: &str) {
        if !self.capabilities.persistence {
            return;
        }
        if let Err(e) = self.store.set(&key(name), value) {
            warn!(error = %e, "could not persist {name}");
        }
    }

    /// Prepares the login screen and tries stored credentials.
    pub async fn start(&mut self) -> Result<StartAction, LoginError> {
        if let Some(message) = &self.persisted_feedback {
            self.feedback = message.clone();
        }

        if self.capabilities.persistence && self.auto_login {
            if let Some(username) = self.store.get(&key("username")) {
                self.username = username;
            }
            if let Some(password) = self.store.get(&key("password")) {
                self.pending_password = password;
                info!("Auto-login...");
                let result = self.login().await?;
                return Ok(StartAction::AutoLogin(result));
            }
        }

        if self.capabilities.browser_bridge {
            self.visible = false;
            Ok(StartAction::AwaitingBrowser)
        } else {
            self.visible = true;
            Ok(StartAction::ShowForm)
        }
    }

    /// Logs in with whatever is typed in the form.
    pub async fn submit(&mut self) -> Result<FormResult, LoginError> {
        self.pending_password = self.password.clone();
        self.login().await
    }

    /// Logs in with the current username and pending password.
    pub async fn login(&mut self) -> Result<FormResult, LoginError> {
        self.feedback = "Logging in... ".into();
        self.persist("username", &self.username);

        let response = self
            .service
            .login(&self.username, &self.pending_password)
            .await;
        self.password.clear();

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.show_error(&e.to_string(), "Error", true);
                return Err(e.into());
            }
        };

        info!(success = response.is_success(), "Login Success: {}", response.is_success());
        match response {
            ApiResponse::Success(_) => {
                self.persist("password", &self.pending_password);
                self.logged_in = true;
                let scene = if self.start_scene > 0 {
                    self.start_scene
                } else {
                    1
                };
                Ok(FormResult::LoggedIn { scene })
            }
            ApiResponse::Failure(message) => {
                info!(%message, "login rejected");
                self.visible = true;
                self.feedback = LOGIN_FAILED_MESSAGE.into();
                Ok(FormResult::Rejected(LOGIN_FAILED_MESSAGE.into()))
            }
        }
    }

    /// Stops auto-login and keeps `message` for the next `start`.
    pub fn cancel_login(&mut self, message: Option<&str>) {
        self.logged_in = false;
        self.auto_login = false;
        self.persisted_feedback = Some(message.unwrap_or(DEFAULT_CANCEL_MESSAGE).to_string());
    }

    pub fn open_register(&mut self) {
        self.screen = Screen::Register;
        self.register_form.username = self.username.clone();
        self.register_form.password = self.password.clone();
        self.register_form.confirm_password = self.password.clone();
    }

    pub fn close_register(&mut self) {
        self.screen = Screen::Login;
    }

    /// Validates the registration form, registers, then logs in.
    pub async fn register(&mut self) -> Result<FormResult, LoginError> {
        self.register_feedback = "Registering... ".into();

        if let Err(message) = self.register_form.validate() {
            self.register_feedback = message.clone();
            return Ok(FormResult::Rejected(message));
        }

        let response = match self
            .service
            .register(&self.register_form.registration())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.show_error(&e.to_string(), "Error", true);
                return Err(e.into());
            }
        };

        match response {
            ApiResponse::Success(_) => {
                info!(username = %self.register_form.username, "registered");
                self.username = self.register_form.username.clone();
                self.password = self.register_form.password.clone();
                self.pending_password = self.password.clone();
                self.screen = Screen::Login;
                self.login().await
            }
            ApiResponse::Failure(message) => {
                let message = format!("Registration Failed: {message}");
                info!(%message, "registration rejected");
                self.visible = true;
                self.register_feedback = message.clone();
                Ok(FormResult::Rejected(message))
            }
        }
    }

    /// Credentials supplied by the hosting web page.
    pub async fn web_login(&mut self, json: &str) -> Result<FormResult, LoginError> {
        let payload = BrowserLogin::parse(json)?;

        self.username = payload.username.clone();
        self.pending_password = payload.password.clone();
        self.browser_info = payload.browser_info.clone();

        if let Some(experiment) = payload.requested_experiment() {
            self.requested_experiment = Some(experiment);
        }
        if let Some(group) = payload.requested_experiment_group() {
            self.requested_experiment_group = Some(group);
        }

        self.login().await
    }

    /// Full-screen error. Only a dismissible one can be closed again.
    pub fn show_error(&mut self, message: &str, title: &str, dismissible: bool) {
        self.error = Some(ErrorDialog {
            title: title.to_string(),
            message: message.to_string(),
            dismissible,
        });
    }

    pub fn dismiss_error(&mut self) -> bool {
        match &self.error {
            Some(dialog) if dialog.dismissible => {
                self.error = None;
                true
            }
            _ => false,
        }
    }
}
