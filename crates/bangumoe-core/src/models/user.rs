use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{ApiError, ApiResult};

/// Minimum password length accepted by the registration form
const MIN_PASSWORD_LENGTH: usize = 6;

/// Profile of the logged-in user as returned by `/api/v1/user/info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: String,
    /// Only consulted by the beta gate
    #[serde(default)]
    pub is_allowed: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A file attached to a multipart form (avatars).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Guess the MIME type from the file extension; avatars are images.
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let mime = match ext.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        };
        Self {
            file_name,
            mime: mime.to_string(),
            bytes,
        }
    }
}

#[derive(Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub email: String,
    pub avatar: Option<Upload>,
}

impl fmt::Debug for RegistrationForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationForm")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("avatar", &self.avatar.as_ref().map(|a| &a.file_name))
            .finish_non_exhaustive()
    }
}

impl RegistrationForm {
    /// Checks performed before the form is sent.
    pub fn validate(&self) -> ApiResult<()> {
        if self.username.trim().is_empty() {
            return Err(ApiError::validation("请输入用户名"));
        }
        if self.password.len() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::validation(format!(
                "密码长度不能少于{}位",
                MIN_PASSWORD_LENGTH
            )));
        }
        if self.password != self.confirm_password {
            return Err(ApiError::validation("两次输入的密码不一致"));
        }
        if !is_plausible_email(&self.email) {
            return Err(ApiError::validation("请输入有效的邮箱地址"));
        }
        Ok(())
    }
}

/// Fields accepted by `PUT /api/v1/user/info`. Unset fields are left unchanged.
#[derive(Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub avatar: Option<Upload>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

impl fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("email", &self.email)
            .field("avatar", &self.avatar.as_ref().map(|a| &a.file_name))
            .field("password_change", &self.new_password.is_some())
            .finish()
    }
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.avatar.is_none()
            && self.old_password.is_none()
            && self.new_password.is_none()
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.is_empty() {
            return Err(ApiError::validation("没有需要更新的内容"));
        }
        if let Some(ref email) = self.email {
            if !is_plausible_email(email) {
                return Err(ApiError::validation("请输入有效的邮箱地址"));
            }
        }
        match (&self.old_password, &self.new_password) {
            (None, Some(_)) => Err(ApiError::validation("修改密码需要提供原密码")),
            (Some(_), None) => Err(ApiError::validation("请输入新密码")),
            (Some(_), Some(new)) if new.len() < MIN_PASSWORD_LENGTH => Err(ApiError::validation(
                format!("密码长度不能少于{}位", MIN_PASSWORD_LENGTH),
            )),
            _ => Ok(()),
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            username: "mikan".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            email: "mikan@example.com".into(),
            avatar: None,
        }
    }

    #[test]
    fn test_parse_profile() {
        let json = r#"{"id":7,"username":"mikan","email":"mikan@example.com","avatar":"/a/7.png","role":"user","is_allowed":true,"created_at":"2024-04-01T12:00:00Z","updated_at":"2024-04-02T12:00:00Z"}"#;
        let profile: UserProfile = serde_json::from_str(json).expect("valid profile");
        assert_eq!(profile.id, 7);
        assert!(profile.is_allowed);
        assert_eq!(profile.role, "user");
        assert!(profile.created_at.is_some());
    }

    #[test]
    fn test_profile_missing_optional_fields() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id":1,"username":"a"}"#).expect("minimal profile");
        assert!(!profile.is_allowed);
        assert!(profile.avatar.is_none());
    }

    #[test]
    fn test_registration_validation() {
        assert!(form().validate().is_ok());

        let mut f = form();
        f.confirm_password = "different".into();
        assert!(f.validate().is_err());

        let mut f = form();
        f.email = "not-an-email".into();
        assert!(f.validate().is_err());

        let mut f = form();
        f.username = "  ".into();
        assert!(f.validate().is_err());

        let mut f = form();
        f.password = "123".into();
        f.confirm_password = "123".into();
        assert!(f.validate().is_err());
    }

    #[test]
    fn test_profile_update_validation() {
        assert!(ProfileUpdate::default().validate().is_err());

        let update = ProfileUpdate {
            new_password: Some("newsecret".into()),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = ProfileUpdate {
            old_password: Some("oldsecret".into()),
            new_password: Some("newsecret".into()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let update = ProfileUpdate {
            email: Some("x@y.org".into()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("mikan", "hunter22");
        let printed = format!("{creds:?}");
        assert!(printed.contains("mikan"));
        assert!(!printed.contains("hunter22"));
    }

    #[test]
    fn test_upload_mime_guess() {
        assert_eq!(Upload::from_bytes("me.PNG", vec![]).mime, "image/png");
        assert_eq!(Upload::from_bytes("me.jpeg", vec![]).mime, "image/jpeg");
        assert_eq!(Upload::from_bytes("me", vec![]).mime, "application/octet-stream");
    }
}
