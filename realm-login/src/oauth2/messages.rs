//! User-facing messages
//!
//! Failure messages are generic by kind. Provider error bodies and stack
//! details never end up here; they are logged instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::oauth2::authenticator::FailureKind;
use crate::oauth2::types::ProviderKind;

/// Supported message locales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English
    #[default]
    En,
    /// German
    De,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "de" => Ok(Self::De),
            other => Err(format!("unsupported locale '{other}'")),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::En => "en",
            Self::De => "de",
        })
    }
}

/// Message catalog of one locale
#[derive(Debug, Clone, Copy, Default)]
pub struct Translator {
    locale: Locale,
}

impl Translator {
    /// Create a translator for a locale
    #[must_use]
    pub const fn new(locale: Locale) -> Self {
        Self { locale }
    }

    /// Active locale
    #[must_use]
    pub const fn locale(&self) -> Locale {
        self.locale
    }

    /// Message shown for a failed login
    ///
    /// `identifier` is the looked-up identifier value and only used for
    /// `UserNotFound`. The same text is produced whether the account is
    /// missing or inactive.
    #[must_use]
    pub fn failure(
        &self,
        kind: &FailureKind,
        provider: ProviderKind,
        identifier_field: &str,
        identifier: Option<&str>,
    ) -> String {
        let provider = provider.display_name();

        match (self.locale, kind) {
            (Locale::En, FailureKind::ClientNotActivated) => {
                "This login option is not activated.".to_string()
            }
            (Locale::De, FailureKind::ClientNotActivated) => {
                "Diese Login-Option ist nicht aktiviert.".to_string()
            }
            (Locale::En, FailureKind::NoAuthCode) => {
                "The login was cancelled or no authorization code was returned.".to_string()
            }
            (Locale::De, FailureKind::NoAuthCode) => {
                "Die Anmeldung wurde abgebrochen oder es wurde kein Autorisierungscode geliefert."
                    .to_string()
            }
            (Locale::En, FailureKind::InvalidState) => {
                "Invalid OAuth2 state. Please start the login again.".to_string()
            }
            (Locale::De, FailureKind::InvalidState) => {
                "Ungültiger OAuth2-Status. Bitte starten Sie die Anmeldung erneut.".to_string()
            }
            (Locale::En, FailureKind::IdentityProviderError) => format!(
                "{provider} user not accessible by integration. Please check your {provider} App settings."
            ),
            (Locale::De, FailureKind::IdentityProviderError) => format!(
                "Zugriff auf {provider} Benutzer aufgrund eines Konfigurationsfehlers nicht möglich. Bitte überprüfen Sie die {provider} App Einstellungen."
            ),
            (locale, FailureKind::UserNotFound { .. }) => {
                Self::user_not_found(locale, identifier_field, identifier.unwrap_or_default())
            }
            (Locale::En, FailureKind::Unexpected) => {
                "An unexpected error occurred. Please try again.".to_string()
            }
            (Locale::De, FailureKind::Unexpected) => {
                "Ein unerwarteter Fehler ist aufgetreten. Bitte versuchen Sie es erneut.".to_string()
            }
        }
    }

    fn user_not_found(locale: Locale, field: &str, value: &str) -> String {
        match (locale, field) {
            (Locale::En, "email") => {
                format!("No user with the email address \"{value}\" was found in the database.")
            }
            (Locale::En, _) => {
                format!("No user with the {field} \"{value}\" was found in the database.")
            }
            (Locale::De, "email") => format!(
                "Es wurde kein Benutzer mit der Email-Adresse \"{value}\" in der Datenbank gefunden."
            ),
            (Locale::De, _) => format!(
                "Es wurde kein Benutzer mit dem Wert \"{value}\" im Feld {field} in der Datenbank gefunden."
            ),
        }
    }

    /// Message for a rejected start request token
    #[must_use]
    pub const fn invalid_request_token(&self) -> &'static str {
        match self.locale {
            Locale::En => "Invalid CSRF token. Please reload the page and try again.",
            Locale::De => "Ungültiges CSRF-Token. Bitte laden Sie die Seite neu und versuchen Sie es erneut.",
        }
    }

    /// Message for a start URL with a missing or wrong signature
    #[must_use]
    pub const fn invalid_signature(&self) -> &'static str {
        match self.locale {
            Locale::En => "The login link is invalid or has expired.",
            Locale::De => "Der Login-Link ist ungültig oder abgelaufen.",
        }
    }

    /// Label of a provider login button
    #[must_use]
    pub fn button_label(&self, provider: ProviderKind) -> String {
        let provider = provider.display_name();
        match self.locale {
            Locale::En => format!("Log in with {provider}"),
            Locale::De => format!("Login mit {provider}"),
        }
    }

    /// Separator between the regular login form and the provider buttons
    #[must_use]
    pub const fn or(&self) -> &'static str {
        match self.locale {
            Locale::En => "or",
            Locale::De => "oder",
        }
    }
}
