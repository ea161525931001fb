use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()>;
}

/// Writes outgoing mail to the log instead of an SMTP relay.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()> {
        info!(
            to = %message.to,
            from = %message.from,
            subject = %message.subject,
            body = %message.body,
            "mail sent"
        );
        Ok(())
    }
}

/// Keeps sent messages so tests can inspect them. Fails every send when
/// `failing` is set.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<MailMessage>>,
    pub failing: bool,
}

#[cfg(test)]
#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: MailMessage) -> anyhow::Result<()> {
        anyhow::ensure!(!self.failing, "smtp relay unreachable");
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("mailer lock poisoned"))?
            .push(message);
        Ok(())
    }
}

pub fn password_reset_message(
    to: &str,
    from: &str,
    reset_link_base: &str,
    token: &str,
    user_id: uuid::Uuid,
) -> MailMessage {
    let link = format!(
        "{}/users/reset_password/{}/{}",
        reset_link_base.trim_end_matches('/'),
        token,
        user_id
    );
    MailMessage {
        to: to.to_string(),
        from: from.to_string(),
        subject: "Password reset".into(),
        body: format!(
            "You asked to reset your password. Use this link to choose a new one: {}",
            link
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_message_contains_link() {
        let id = uuid::Uuid::new_v4();
        let msg = password_reset_message("a@b.io", "no-reply@x.io", "http://host/", "tok123", id);
        assert_eq!(msg.to, "a@b.io");
        assert!(msg
            .body
            .contains(&format!("http://host/users/reset_password/tok123/{}", id)));
    }
}
