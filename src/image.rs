//! Image-name parser: splits a user-supplied image reference into
//! registry, full repository path, and tag.

const DEFAULT_REGISTRY: &str = "registry.hub.docker.com/library";
const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedImage {
    pub registry: String,
    pub image_full: String,
    pub tag: String,
}

impl ParsedImage {
    pub fn image_with_tag(&self) -> String {
        format!("{}:{}", self.image_full, self.tag)
    }
}

pub fn parse_image_ref(image_ref: &str) -> ParsedImage {
    let (registry, repository) = match image_ref.rfind('/') {
        Some(idx) => (image_ref[..idx].to_string(), image_ref[idx + 1..].to_string()),
        None => (DEFAULT_REGISTRY.to_string(), image_ref.to_string()),
    };

    let (repo_name, tag) = match repository.split_once(':') {
        Some((name, tag)) => (name.to_string(), tag.to_string()),
        None => (repository, DEFAULT_TAG.to_string()),
    };

    ParsedImage {
        image_full: format!("{}/{}", registry, repo_name),
        registry,
        tag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_name_gets_default_registry_and_tag() {
        let p = parse_image_ref("nginx");
        assert_eq!(p.registry, DEFAULT_REGISTRY);
        assert_eq!(p.image_full, format!("{}/nginx", DEFAULT_REGISTRY));
        assert_eq!(p.tag, "latest");
    }

    #[test]
    fn bare_name_with_tag() {
        let p = parse_image_ref("nginx:1.25");
        assert_eq!(p.tag, "1.25");
        assert_eq!(p.image_full, format!("{}/nginx", DEFAULT_REGISTRY));
    }

    #[test]
    fn custom_registry_with_nested_path_and_tag() {
        let p = parse_image_ref("registry.example.com/team/app:2.0");
        assert_eq!(p.registry, "registry.example.com/team");
        assert_eq!(p.image_full, "registry.example.com/team/app");
        assert_eq!(p.tag, "2.0");
    }

    #[test]
    fn custom_registry_without_tag_defaults_latest() {
        let p = parse_image_ref("registry.example.com/app");
        assert_eq!(p.registry, "registry.example.com");
        assert_eq!(p.tag, "latest");
    }

    #[test]
    fn image_with_tag_formats_correctly() {
        let p = parse_image_ref("nginx:1.25");
        assert_eq!(p.image_with_tag(), format!("{}/nginx:1.25", DEFAULT_REGISTRY));
    }
}
