use crate::{Error, Page};

/// The login form. Carries the hidden anti-forgery field when present.
#[derive(Debug)]
pub struct LoginPage {
    pub token: Option<String>,
}

impl Page for LoginPage {
    fn from_document(document: kuchikiki::NodeRef) -> Result<Self, Error> {
        let token = document
            .select_first("input[name='_token']")
            .ok()
            .and_then(|input| input.attributes.borrow().get("value").map(str::to_owned));

        Ok(Self { token })
    }
}

/// The page the portal lands on after a successful login. The csrf token in
/// its `<meta>` head is required by every later form post.
#[derive(Debug)]
pub struct DashboardPage {
    pub csrf: String,
}

impl Page for DashboardPage {
    fn from_document(document: kuchikiki::NodeRef) -> Result<Self, Error> {
        let csrf = document
            .select_first("meta[name='csrf-token']")
            .map_err(|_| Error::MissingCsrfToken)?
            .attributes
            .borrow()
            .get("content")
            .ok_or(Error::MissingCsrfToken)?
            .to_owned();

        Ok(Self { csrf })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_page_token() {
        let page = LoginPage::from_html(
            r#"<form method="POST" action="/login">
                <input type="hidden" name="_token" value="tok123">
                <input type="email" name="email">
            </form>"#
                .to_string(),
        )
        .unwrap();
        assert_eq!(page.token.as_deref(), Some("tok123"));
    }

    #[test]
    fn test_login_page_without_token_is_tolerated() {
        let page = LoginPage::from_html("<form><input name='email'></form>".to_string()).unwrap();
        assert!(page.token.is_none());
    }

    #[test]
    fn test_dashboard_csrf() {
        let page = DashboardPage::from_html(
            r#"<head><meta name="csrf-token" content="csrf456"></head><body></body>"#.to_string(),
        )
        .unwrap();
        assert_eq!(page.csrf, "csrf456");
    }

    #[test]
    fn test_dashboard_without_csrf_is_an_error() {
        let result = DashboardPage::from_html("<head></head><body></body>".to_string());
        assert!(matches!(result, Err(Error::MissingCsrfToken)));
    }
}
