/// 收件人分隔符
pub const RECIPIENT_SEPARATOR: char = ';';

/// 解析收件人列表
///
/// 按 `;` 分割，去掉首尾空白和空项，重复地址只保留第一次出现的位置。
pub fn parse_recipients(raw: &str) -> Vec<String> {
    let mut recipients: Vec<String> = Vec::new();

    for entry in raw.split(RECIPIENT_SEPARATOR).map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        if recipients.iter().any(|existing| existing.eq_ignore_ascii_case(entry)) {
            continue;
        }
        recipients.push(entry.to_string());
    }

    recipients
}

/// 一次告警对应的通知请求，发送期间不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    recipients: Vec<String>,
    subject: String,
    body: String,
}

impl NotificationRequest {
    /// 收件人去重后为空时返回 None
    pub fn new(
        recipients: impl IntoIterator<Item = String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Option<Self> {
        let joined = recipients
            .into_iter()
            .collect::<Vec<_>>()
            .join(&RECIPIENT_SEPARATOR.to_string());
        let recipients = parse_recipients(&joined);

        if recipients.is_empty() {
            return None;
        }

        Some(Self {
            recipients,
            subject: subject.into(),
            body: body.into(),
        })
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// HTML 正文
    pub fn body(&self) -> &str {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients() {
        let raw = " ops@example.com ;; admin@example.com;  ;ops@example.com";
        let recipients = parse_recipients(raw);
        assert_eq!(recipients, vec!["ops@example.com", "admin@example.com"]);
    }

    #[test]
    fn test_parse_empty_recipients() {
        assert!(parse_recipients("").is_empty());
        assert!(parse_recipients(" ; ;").is_empty());
    }

    #[test]
    fn test_request_requires_recipients() {
        assert!(NotificationRequest::new(Vec::<String>::new(), "s", "b").is_none());
        assert!(NotificationRequest::new(vec!["  ".to_string()], "s", "b").is_none());
    }

    #[test]
    fn test_request_deduplicates_recipients() {
        let request = NotificationRequest::new(
            vec![
                "a@example.com".to_string(),
                "b@example.com".to_string(),
                "A@example.com".to_string(),
            ],
            "Subject",
            "<p>body</p>",
        )
        .unwrap();

        assert_eq!(request.recipients(), ["a@example.com", "b@example.com"]);
        assert_eq!(request.subject(), "Subject");
        assert_eq!(request.body(), "<p>body</p>");
    }
}
