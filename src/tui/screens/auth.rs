//! Sign-in and sign-up form

use crate::error::{AppError, Result};
use crate::tui::screens::TextInput;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

/// A validated form, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequest {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        display_name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    DisplayName,
    Email,
    Password,
}

#[derive(Debug, Default)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub display_name: TextInput,
    pub email: TextInput,
    pub password: TextInput,
    focus: usize,
    pub submitting: bool,
    pub error: Option<String>,
}

impl AuthForm {
    pub fn fields(&self) -> &'static [AuthField] {
        match self.mode {
            AuthMode::SignIn => &[AuthField::Email, AuthField::Password],
            AuthMode::SignUp => &[AuthField::DisplayName, AuthField::Email, AuthField::Password],
        }
    }

    pub fn focused(&self) -> AuthField {
        let fields = self.fields();
        fields[self.focus.min(fields.len() - 1)]
    }

    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % self.fields().len();
    }

    pub fn previous_field(&mut self) {
        let len = self.fields().len();
        self.focus = (self.focus + len - 1) % len;
    }

    pub fn focused_input(&mut self) -> &mut TextInput {
        match self.focused() {
            AuthField::DisplayName => &mut self.display_name,
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        }
    }

    /// Switch between signing in and creating an account
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
        self.focus = 0;
        self.error = None;
    }

    /// Check the fields and build the request to send
    pub fn validate(&self) -> Result<AuthRequest> {
        let email = self.email.value().trim().to_string();
        let password = self.password.value().to_string();

        if email.is_empty() || !email.contains('@') {
            return Err(AppError::InvalidInput(
                "Enter a valid email address".into(),
            ));
        }
        if password.is_empty() {
            return Err(AppError::InvalidInput("Enter your password".into()));
        }

        match self.mode {
            AuthMode::SignIn => Ok(AuthRequest::SignIn { email, password }),
            AuthMode::SignUp => {
                let display_name = self.display_name.value().trim().to_string();
                if display_name.is_empty() {
                    return Err(AppError::InvalidInput("Enter a display name".into()));
                }
                if password.chars().count() < MIN_PASSWORD_LEN {
                    return Err(AppError::InvalidInput(format!(
                        "Password must be at least {MIN_PASSWORD_LEN} characters"
                    )));
                }
                Ok(AuthRequest::SignUp {
                    email,
                    password,
                    display_name,
                })
            }
        }
    }

    /// Forget the password after a submit, keep the rest
    pub fn reset_password(&mut self) {
        self.password.clear();
    }
}
