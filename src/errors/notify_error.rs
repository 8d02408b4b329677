//! 通知发送错误

use crate::models::SendOutcome;

/// 单个渠道发送失败的原因
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    #[error("服务端返回状态码 {code}: {body}")]
    Status { code: u16, body: String },

    #[error("邮件发送失败: {0}")]
    Mail(String),

    #[error("短信发送失败: {0}")]
    Sms(String),

    #[error("渠道配置无效: {0}")]
    InvalidConfig(String),

    #[error("发送超时（{0} 秒）")]
    Timeout(u64),

    #[error("{failed}/{total} 个接收方发送失败: {details}")]
    Recipients {
        failed: usize,
        total: usize,
        details: String,
    },
}

impl NotifyError {
    /// 可记录的响应码
    pub fn response_code(&self) -> Option<i32> {
        match self {
            NotifyError::Status { code, .. } => Some(i32::from(*code)),
            NotifyError::Http(e) => e.status().map(|s| i32::from(s.as_u16())),
            _ => None,
        }
    }
}

/// 合并逐个接收方的发送结果
///
/// 全部成功才算成功；失败时错误信息列出每个失败的接收方。
pub fn merge_recipient_results(
    results: Vec<(String, Result<SendOutcome, NotifyError>)>,
) -> Result<SendOutcome, NotifyError> {
    let total = results.len();
    let mut last_code = None;
    let mut failures = Vec::new();

    for (recipient, result) in results {
        match result {
            Ok(outcome) => last_code = outcome.response_code.or(last_code),
            Err(e) => failures.push(format!("{}: {}", recipient, e)),
        }
    }

    if failures.is_empty() {
        Ok(SendOutcome {
            response_code: last_code,
        })
    } else {
        Err(NotifyError::Recipients {
            failed: failures.len(),
            total,
            details: failures.join("; "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_all_ok() {
        let merged = merge_recipient_results(vec![
            ("a".to_string(), Ok(SendOutcome { response_code: Some(201) })),
            ("b".to_string(), Ok(SendOutcome::default())),
        ]);
        assert_eq!(merged.unwrap().response_code, Some(201));
    }

    #[test]
    fn test_merge_partial_failure_lists_recipient() {
        let merged = merge_recipient_results(vec![
            ("ok@example.com".to_string(), Ok(SendOutcome::default())),
            (
                "bad@example.com".to_string(),
                Err(NotifyError::Mail("550 mailbox unavailable".to_string())),
            ),
        ]);

        match merged.unwrap_err() {
            NotifyError::Recipients { failed, total, details } => {
                assert_eq!((failed, total), (1, 2));
                assert!(details.contains("bad@example.com"));
                assert!(!details.contains("ok@example.com"));
            }
            other => panic!("意外的错误类型: {:?}", other),
        }
    }

    #[test]
    fn test_status_response_code() {
        let err = NotifyError::Status { code: 503, body: String::new() };
        assert_eq!(err.response_code(), Some(503));
        assert_eq!(NotifyError::Timeout(10).response_code(), None);
    }
}
