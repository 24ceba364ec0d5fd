/// Unique index over a set of fields, restricted to one entity variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: String,
    pub name: &'static str,
    /// Discriminator value the index applies to.
    pub kind: &'static str,
    /// Dotted field paths making up the key.
    pub fields: Vec<&'static str>,
}

impl IndexSpec {
    pub fn unique(
        collection: impl Into<String>,
        name: &'static str,
        kind: &'static str,
        fields: &[&'static str],
    ) -> Self {
        Self {
            collection: collection.into(),
            name,
            kind,
            fields: fields.to_vec(),
        }
    }
}
