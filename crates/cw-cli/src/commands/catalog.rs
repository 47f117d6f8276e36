//! Catalog traversal commands.

use crate::config::AppConfig;
use crate::OutputFormat;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use cw_connectors::HttpCatalogTransport;
use cw_core::{
    AssetTypeDescriptor, CatalogClient, CollectionItem, CollectionOptions, DetailObject,
    PropertyKind, PropertyValue, Reference,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Options for walking a collection relationship.
pub struct WalkArgs {
    pub id: String,
    pub type_id: String,
    pub relationship: String,
    pub page_size: Option<u32>,
    pub eager: bool,
    pub limit: Option<usize>,
}

/// Builds a client over the REST transport, seeding types if configured.
pub async fn connect(config: &AppConfig) -> Result<CatalogClient> {
    let transport =
        HttpCatalogTransport::with_rate_limit(config.connector.clone(), config.rate_limit.clone())
            .with_context(|| format!("Failed to create transport for {}", config.connector.base_url))?;

    let client = CatalogClient::builder(Arc::new(transport))
        .config(config.client.clone())
        .build();

    if let Some(path) = &config.schema_table {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema table: {}", path))?;
        let table: Value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse schema table: {}", path))?;
        let count = client.seed_types(&table).await?;
        info!(count, path = %path, "Seeded types from schema table");
    }

    Ok(client)
}

pub async fn cmd_type(client: &CatalogClient, type_id: &str, format: OutputFormat) -> Result<()> {
    let resolution = client.type_descriptor(type_id).await;
    if let Some(warning) = &resolution.warning {
        bail!("Could not resolve type: {}", warning);
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(resolution.descriptor.as_ref())?);
    } else {
        print_descriptor(&resolution.descriptor);
    }
    Ok(())
}

pub async fn cmd_get(
    client: &CatalogClient,
    id: &str,
    type_id: &str,
    properties: &[String],
    format: OutputFormat,
) -> Result<()> {
    let reference = Reference::new(id, type_id);
    let object = if properties.is_empty() {
        client.resolve(&reference).await?
    } else {
        client
            .resolve_partial(&reference, properties.iter().cloned())
            .await?
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(object.as_ref())?);
    } else {
        print_object(&object);
    }
    Ok(())
}

pub async fn cmd_walk(client: &CatalogClient, args: WalkArgs, format: OutputFormat) -> Result<()> {
    let owner = client.resolve_id(&args.id, &args.type_id).await?;
    let collection = client.relationship(&owner, &args.relationship)?;

    let mut options = client.config().collection_options();
    if let Some(page_size) = args.page_size {
        options = options.with_page_size(page_size);
    }
    if args.eager {
        options = CollectionOptions {
            eager: true,
            ..options
        };
    }

    let mut cursor = client.iterate_with(collection, options);
    let limit = args.limit.unwrap_or(usize::MAX);
    let mut produced = 0;

    if format == OutputFormat::Text {
        println!(
            "{} {} {}",
            owner.reference().to_string().cyan(),
            "→".dimmed(),
            args.relationship.bold()
        );
    }

    while produced < limit {
        let Some(item) = cursor.next().await? else {
            break;
        };
        produced += 1;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&item_json(&item))?),
            OutputFormat::Text => print_item(produced, &item),
        }
    }

    for warning in cursor.warnings() {
        eprintln!("{}: {}", "warning".yellow().bold(), warning);
    }
    debug!(produced, position = cursor.position(), "Walk finished");

    if format == OutputFormat::Text {
        let total = cursor
            .total()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("{} of {} members", produced, total);
    }
    Ok(())
}

fn item_json(item: &CollectionItem) -> Value {
    match item {
        CollectionItem::Reference(reference) => json!(reference),
        CollectionItem::Detail(object) => json!(object.as_ref()),
    }
}

fn print_item(index: usize, item: &CollectionItem) {
    let reference = item.reference();
    let name = match item {
        CollectionItem::Detail(object) => object.name(),
        CollectionItem::Reference(reference) => reference.name(),
    };
    println!(
        "{:>5}  {}  {}",
        index,
        reference.to_string().cyan(),
        name.unwrap_or("-")
    );
}

fn print_descriptor(descriptor: &AssetTypeDescriptor) {
    println!(
        "{} ({})",
        descriptor.display_name().bold(),
        descriptor.type_id().cyan()
    );
    println!("─────────────────────");
    for name in descriptor.property_names() {
        let kind = match descriptor.kind_of(&name) {
            Some(PropertyKind::Scalar(kind)) => format!("{:?}", kind).to_lowercase(),
            Some(PropertyKind::SingleRelationship(target)) => {
                format!("→ {}", target.unwrap_or("any"))
            }
            Some(PropertyKind::CollectionRelationship(target)) => {
                format!("→ [{}]", target.unwrap_or("any"))
            }
            None => continue,
        };
        let marker = if descriptor.identifying_properties().contains(&name) {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        println!("{} {:<32} {}", marker, name, kind.dimmed());
    }
}

fn print_object(object: &DetailObject) {
    println!(
        "{} {}",
        object.reference().to_string().cyan().bold(),
        object.name().unwrap_or_default()
    );
    if object.is_opaque() {
        println!("{}", "(type unknown, showing raw properties)".yellow());
    }
    println!("─────────────────────");

    for (name, value) in object.properties() {
        let rendered = match value {
            PropertyValue::Scalar(value) => value.to_string(),
            PropertyValue::Reference(reference) => {
                format!("{} {}", reference, reference.name().unwrap_or_default())
            }
            PropertyValue::Collection(collection) => match collection.total() {
                Some(total) => format!("[{} members]", total),
                None => "[collection]".to_string(),
            },
        };
        println!("  {:<32} {}", name, rendered);
    }
    for (name, value) in object.unmodeled_properties() {
        println!("  {:<32} {}", name.dimmed(), value.to_string().dimmed());
    }
    for warning in object.warnings() {
        eprintln!("{}: {}", "warning".yellow().bold(), warning);
    }
}
