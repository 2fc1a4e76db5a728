use super::Email;

const FOOTER: &str = "If you did not request this, you can safely ignore this email.\n\n\
Best regards,\n\
The userhub team";

fn with_link(to: &str, subject: &str, intro: &str, link: &str) -> Email {
    Email {
        to: to.to_string(),
        reply_to: None,
        subject: subject.to_string(),
        body: format!("Hello,\n\n{intro}\n\n{link}\n\n{FOOTER}"),
    }
}

pub fn registration(to: &str, link: &str) -> Email {
    with_link(
        to,
        "Confirm your registration",
        "Thanks for signing up. Follow the link below to activate your account. \
         The link is valid for 24 hours.",
        link,
    )
}

pub fn password_reset(to: &str, link: &str) -> Email {
    with_link(
        to,
        "Password reset",
        "A password reset was requested for your account. \
         Follow the link below to choose a new password.",
        link,
    )
}

pub fn email_change(to: &str, link: &str) -> Email {
    with_link(
        to,
        "Confirm your new email",
        "A request was made to move your account to this address. \
         Follow the link below to confirm the change.",
        link,
    )
}

pub fn account_deletion(to: &str, link: &str) -> Email {
    with_link(
        to,
        "Confirm account deletion",
        "A request was made to delete your account and all of its data. \
         Follow the link below to confirm. This cannot be undone.",
        link,
    )
}

/// Contact-form submission forwarded to the admin mailbox; replies go
/// straight back to the sender.
pub fn contact_form(admin: &str, from: &str, subject: &str, message: &str) -> Email {
    Email {
        to: admin.to_string(),
        reply_to: Some(from.to_string()),
        subject: format!("Contact Us: {from}"),
        body: format!(
            "Message from contact form\nEmail: {from}\nSubject: {subject}\nMessage: {message}"
        ),
    }
}
