//! Authentication primitives: login credentials, registrations and profile
//! patches.
//!
//! Keep inbound payload parsing outside the domain by exposing constructors
//! that validate string inputs before a handler talks to a port or service.

use std::fmt;

use zeroize::Zeroizing;

use super::user::{
    EmailAddress, UserName, UserValidationError, normalise_phone, validate_age,
};

/// Minimum password length accepted at registration.
pub const PASSWORD_MIN: usize = 8;

/// Domain error returned when credential payload values are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialValidationError {
    /// Email was missing or malformed.
    InvalidEmail,
    /// Password was blank.
    EmptyPassword,
    /// Password is shorter than [`PASSWORD_MIN`].
    PasswordTooShort { min: usize },
    /// A profile field failed validation.
    Profile(UserValidationError),
    /// A profile patch carried no fields.
    EmptyPatch,
}

impl fmt::Display for CredentialValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEmail => write!(f, "email must be a valid address"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
            Self::PasswordTooShort { min } => {
                write!(f, "password must be at least {min} characters")
            }
            Self::Profile(inner) => inner.fmt(f),
            Self::EmptyPatch => write!(f, "at least one field must be provided"),
        }
    }
}

impl std::error::Error for CredentialValidationError {}

impl From<UserValidationError> for CredentialValidationError {
    fn from(value: UserValidationError) -> Self {
        match value {
            UserValidationError::InvalidEmail => Self::InvalidEmail,
            other => Self::Profile(other),
        }
    }
}

impl CredentialValidationError {
    /// Name of the offending field for structured error details.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "email",
            Self::EmptyPassword | Self::PasswordTooShort { .. } => "password",
            Self::Profile(UserValidationError::EmptyName | UserValidationError::NameTooLong { .. }) => {
                "name"
            }
            Self::Profile(UserValidationError::PhoneTooLong { .. }) => "phone",
            Self::Profile(UserValidationError::AgeOutOfRange { .. }) => "age",
            Self::Profile(_) => "id",
            Self::EmptyPatch => "body",
        }
    }
}

fn new_password(password: &str) -> Result<Zeroizing<String>, CredentialValidationError> {
    if password.is_empty() {
        return Err(CredentialValidationError::EmptyPassword);
    }
    if password.chars().count() < PASSWORD_MIN {
        return Err(CredentialValidationError::PasswordTooShort { min: PASSWORD_MIN });
    }
    Ok(Zeroizing::new(password.to_owned()))
}

/// Validated login credentials used by the identity service.
///
/// ## Invariants
/// - `email` is normalised to lower case.
/// - `password` is non-empty but retains caller-provided whitespace.
///
/// # Examples
/// ```
/// use healthfund::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts("Ada@Example.com", "pw").expect("valid");
/// assert_eq!(creds.email().as_ref(), "ada@example.com");
/// assert_eq!(creds.password(), "pw");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    email: EmailAddress,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw email/password inputs.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, CredentialValidationError> {
        let email = EmailAddress::new(email)?;
        if password.is_empty() {
            return Err(CredentialValidationError::EmptyPassword);
        }
        Ok(Self {
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Email used for the user lookup.
    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Password string provided by the caller.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

/// Raw registration input as received from an adapter.
#[derive(Debug, Clone, Default)]
pub struct RegistrationInput<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub phone: Option<&'a str>,
    pub age: Option<u8>,
}

/// Validated registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    name: UserName,
    email: EmailAddress,
    password: Zeroizing<String>,
    phone: Option<String>,
    age: Option<u8>,
}

impl Registration {
    /// Validate every field of a registration.
    pub fn try_new(input: RegistrationInput<'_>) -> Result<Self, CredentialValidationError> {
        Ok(Self {
            name: UserName::new(input.name)?,
            email: EmailAddress::new(input.email)?,
            password: new_password(input.password)?,
            phone: normalise_phone(input.phone)?,
            age: validate_age(input.age)?,
        })
    }

    #[must_use]
    pub fn name(&self) -> &UserName {
        &self.name
    }

    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &str {
        self.password.as_str()
    }

    #[must_use]
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    #[must_use]
    pub fn age(&self) -> Option<u8> {
        self.age
    }
}

/// Validated partial update of the caller's own profile.
///
/// `phone: Some(None)` clears the stored phone number.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfilePatch {
    pub name: Option<UserName>,
    pub email: Option<EmailAddress>,
    pub phone: Option<Option<String>>,
    pub age: Option<u8>,
    pub password: Option<Zeroizing<String>>,
}

/// Raw profile patch input.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatchInput<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub age: Option<u8>,
    pub password: Option<&'a str>,
}

impl ProfilePatch {
    /// Validate a patch; at least one field must be present.
    pub fn try_new(input: ProfilePatchInput<'_>) -> Result<Self, CredentialValidationError> {
        if input.name.is_none()
            && input.email.is_none()
            && input.phone.is_none()
            && input.age.is_none()
            && input.password.is_none()
        {
            return Err(CredentialValidationError::EmptyPatch);
        }
        Ok(Self {
            name: input.name.map(UserName::new).transpose()?,
            email: input.email.map(EmailAddress::new).transpose()?,
            phone: input.phone.map(|raw| normalise_phone(Some(raw))).transpose()?,
            age: validate_age(input.age)?,
            password: input.password.map(new_password).transpose()?,
        })
    }
}
