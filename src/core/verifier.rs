use crate::core::normalize::normalize;
use crate::domain::model::{AccountSeed, LoginClaim, RegistrationClaim, Roster, SessionClaims};
use crate::domain::ports::{AccountStore, PasswordHasher};
use crate::utils::error::{LoginError, RegistrationError};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks a self-service registration against the roster and the existing
/// accounts, and decides which fields get persisted.
///
/// An existing account without a password is a legacy record; registering
/// again is allowed and replaces it.
pub async fn verify_registration<S: AccountStore + ?Sized>(
    claim: &RegistrationClaim,
    roster: &Roster,
    accounts: &S,
) -> Result<AccountSeed, RegistrationError> {
    let normalized_roll_no = normalize(&claim.roll_no);
    let student = roster
        .find(&normalized_roll_no)
        .ok_or(RegistrationError::NoSuchStudent)?;

    let email = normalize_email(&claim.email);
    if let Some(official) = &student.official_email {
        if *official != email {
            tracing::warn!(
                "🚨 Registration for {} used an email that does not match the roster",
                student.roll_no
            );
            return Err(RegistrationError::EmailMismatch);
        }
    }

    let existing = accounts
        .find_account(&normalized_roll_no)
        .await
        .map_err(|e| RegistrationError::Storage {
            message: e.to_string(),
        })?;
    match existing {
        Some(account) if !account.is_legacy() => {
            return Err(RegistrationError::AlreadyRegistered)
        }
        Some(_) => tracing::info!(
            "♻️ Upgrading legacy account {} during registration",
            normalized_roll_no
        ),
        None => {}
    }

    Ok(AccountSeed {
        normalized_roll_no,
        roll_no: student.roll_no.clone(),
        name: student.name.clone(),
        email,
        password_hash: None,
    })
}

/// Authenticates a returning student. Wrong email and wrong password both
/// report `InvalidCredentials`.
pub async fn verify_login<S, H>(
    claim: &LoginClaim,
    accounts: &S,
    passwords: &H,
) -> Result<SessionClaims, LoginError>
where
    S: AccountStore + ?Sized,
    H: PasswordHasher + ?Sized,
{
    let normalized_roll_no = normalize(&claim.roll_no);
    if normalized_roll_no.is_empty() {
        return Err(LoginError::NotRegistered);
    }

    let account = accounts
        .find_account(&normalized_roll_no)
        .await
        .map_err(|e| LoginError::Storage {
            message: e.to_string(),
        })?
        .ok_or(LoginError::NotRegistered)?;

    if account.email.to_lowercase() != normalize_email(&claim.email) {
        return Err(LoginError::InvalidCredentials);
    }

    let Some(hash) = account.stored_hash() else {
        return Err(LoginError::LegacyAccountNeedsUpgrade);
    };

    if !passwords.matches(&claim.password, hash) {
        return Err(LoginError::InvalidCredentials);
    }

    Ok(SessionClaims {
        roll_no: account.roll_no.clone(),
        normalized_roll_no,
        email: account.email.clone(),
        name: account.name.clone(),
    })
}
