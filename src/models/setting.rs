use serde_json::{Value, json};

/// Application-layer defaults for each settings category. A settings row is
/// only written on first PUT; until then GET serves these values.
pub fn default_settings(category: &str) -> Option<Value> {
    match category {
        "basic" => Some(json!({
            "siteTitle": "My Blog",
            "siteDescription": "",
            "siteLogo": "",
            "postsPerPage": 10,
            "theme": "light",
            "carouselEnabled": false,
            "carouselApiUrl": "",
            "carouselImageCount": 5,
            "carouselInterval": 5,
            "icp": "",
            "startYear": 2023,
            "footerText": "",
            "footerLinks": [],
        })),
        "profile" => Some(json!({
            "avatar": "",
            "nickname": "",
            "bio": "",
            "email": "",
            "socialLinks": [],
        })),
        "advanced" => Some(json!({
            "analytics": {},
            "customHead": "",
            "customFooter": "",
            "seo": {},
            "cdn": {},
        })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_categories_have_defaults() {
        for category in ["basic", "profile", "advanced"] {
            assert!(default_settings(category).is_some());
        }
    }

    #[test]
    fn unknown_category_has_none() {
        assert!(default_settings("secret").is_none());
    }
}
