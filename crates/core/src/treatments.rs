/// Known remedies for a diagnosed disease.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Treatment {
    pub disease: &'static str,
    pub hindi_name: &'static str,
    pub chemical: &'static str,
    pub organic: &'static str,
    pub prevention: &'static str,
}

const TREATMENTS: &[Treatment] = &[
    Treatment {
        disease: "blast",
        hindi_name: "ब्लास्ट रोग",
        chemical: "Tricyclazole or Tebuconazole fungicide spray",
        organic: "Neem oil spray, proper field drainage",
        prevention: "Use resistant varieties, balanced fertilization",
    },
    Treatment {
        disease: "rust",
        hindi_name: "रस्ट रोग",
        chemical: "Propiconazole or Mancozeb fungicide",
        organic: "Copper oxychloride, garlic extract spray",
        prevention: "Crop rotation, timely sowing",
    },
    Treatment {
        disease: "early_blight",
        hindi_name: "अर्ली ब्लाइट",
        chemical: "Chlorothalonil or Metalaxyl spray",
        organic: "Baking soda spray, neem oil",
        prevention: "Proper spacing, drip irrigation",
    },
];

/// Looks a disease up by name, ignoring case and treating spaces like underscores.
pub fn lookup(disease_name: &str) -> Option<&'static Treatment> {
    let normalized = disease_name.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    TREATMENTS.iter().find(|treatment| treatment.disease == normalized)
}

#[cfg(test)]
mod tests {
    use super::lookup;

    #[test]
    fn lookup_normalizes_names() {
        assert!(lookup("Early Blight").is_some());
        assert!(lookup("early-blight").is_some());
        assert_eq!(lookup("BLAST").map(|treatment| treatment.disease), Some("blast"));
        assert!(lookup("mosaic virus").is_none());
    }
}
