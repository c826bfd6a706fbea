//! Package catalog
//!
//! The three fixed offers sold through checkout. Prices are integer
//! minor-currency units (euro cents). The package id travels in provider
//! metadata and is the only thing webhook handlers need to reconstruct
//! project defaults.

use serde::{Deserialize, Serialize};

use atelier_shared::types::ProjectType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Package {
    Essentiel,
    Professionnel,
    Boutique,
}

impl Package {
    pub const ALL: [Package; 3] = [Package::Essentiel, Package::Professionnel, Package::Boutique];

    /// Identifier used in provider metadata and API payloads.
    pub fn id(&self) -> &'static str {
        match self {
            Package::Essentiel => "essentiel",
            Package::Professionnel => "professionnel",
            Package::Boutique => "boutique",
        }
    }

    /// Case-insensitive lookup; accepts both "essentiel" and "ESSENTIEL".
    pub fn parse(id: &str) -> Option<Package> {
        match id.to_ascii_lowercase().as_str() {
            "essentiel" => Some(Package::Essentiel),
            "professionnel" => Some(Package::Professionnel),
            "boutique" => Some(Package::Boutique),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Package::Essentiel => "Site Essentiel",
            Package::Professionnel => "Site Professionnel",
            Package::Boutique => "Boutique en ligne",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Package::Essentiel => "Site vitrine responsive avec SEO de base",
            Package::Professionnel => "Site professionnel avec CMS et reservation",
            Package::Boutique => "Boutique e-commerce complete avec paiements",
        }
    }

    /// Price in euro cents.
    pub fn price_cents(&self) -> i64 {
        match self {
            Package::Essentiel => 149_900,
            Package::Professionnel => 249_900,
            Package::Boutique => 399_900,
        }
    }

    /// Delivery estimate in days, used as the project timeline default.
    pub fn timeline_days(&self) -> i32 {
        match self {
            Package::Essentiel => 10,
            Package::Professionnel => 14,
            Package::Boutique => 21,
        }
    }

    /// Included revision rounds.
    pub fn revisions(&self) -> u32 {
        match self {
            Package::Essentiel => 2,
            Package::Professionnel => 3,
            Package::Boutique => 5,
        }
    }

    /// Guarantee period in days.
    pub fn guarantee_days(&self) -> u32 {
        match self {
            Package::Essentiel => 30,
            Package::Professionnel => 60,
            Package::Boutique => 90,
        }
    }

    /// Project classification derived from the package.
    pub fn project_type(&self) -> ProjectType {
        match self {
            Package::Boutique => ProjectType::Ecommerce,
            Package::Essentiel | Package::Professionnel => ProjectType::SiteVitrine,
        }
    }

    pub fn features(&self) -> &'static [&'static str] {
        match self {
            Package::Essentiel => &["Design responsive", "SEO", "Contact"],
            Package::Professionnel => &["CMS", "Reservation", "Analytics", "SEO"],
            Package::Boutique => &["E-commerce", "Gestion stocks", "Paiements", "Analytics"],
        }
    }

    /// Stack the studio ships client projects on.
    pub fn technologies(&self) -> &'static [&'static str] {
        &["Next.js", "TypeScript", "Tailwind CSS", "Prisma"]
    }
}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Package::parse("essentiel"), Some(Package::Essentiel));
        assert_eq!(Package::parse("ESSENTIEL"), Some(Package::Essentiel));
        assert_eq!(Package::parse("Boutique"), Some(Package::Boutique));
    }

    #[test]
    fn test_unknown_package_rejected() {
        assert_eq!(Package::parse("premium"), None);
        assert_eq!(Package::parse(""), None);
    }

    #[test]
    fn test_timeline_tiers() {
        assert_eq!(Package::Essentiel.timeline_days(), 10);
        assert_eq!(Package::Professionnel.timeline_days(), 14);
        assert_eq!(Package::Boutique.timeline_days(), 21);
    }

    #[test]
    fn test_boutique_classifies_as_ecommerce() {
        assert_eq!(Package::Boutique.project_type(), ProjectType::Ecommerce);
        assert_eq!(Package::Essentiel.project_type(), ProjectType::SiteVitrine);
        assert_eq!(Package::Professionnel.project_type(), ProjectType::SiteVitrine);
    }

    #[test]
    fn test_prices_are_positive_minor_units() {
        for package in Package::ALL {
            assert!(package.price_cents() > 0);
            // Whole-euro price points
            assert_eq!(package.price_cents() % 100, 0);
        }
    }
}
