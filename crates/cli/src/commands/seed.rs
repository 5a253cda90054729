//! Catalog seeding from YAML files.
//!
//! Files are parsed and validated in full before connecting, so a bad file
//! never leaves the catalog half-updated. Entries are upserted by slug and
//! the command can be re-run safely.
//!
//! ```yaml
//! - slug: moon-pendant
//!   name: Moon Pendant
//!   base_price: "95.00"
//!   currency: EUR
//!   images: ["https://cdn.lunaria.ro/moon.jpg"]
//!   options:
//!     - name: Length
//!       values: ["40-45cm", "45-50cm"]
//! ```

use std::path::Path;

use rust_decimal::Decimal;
use tracing::{error, info};

use lunaria_storefront::db::{ArticleRepository, NewArticle, NewProduct, ProductRepository};

use super::{CommandError, connect};

/// Upsert products from a YAML list.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or the database
/// rejects an entry.
pub async fn products(file: &Path) -> Result<(), CommandError> {
    let products: Vec<NewProduct> = read_yaml(file).await?;
    info!(count = products.len(), "Parsed products");
    report(products.iter().map(|p| (p.slug.as_str(), validate_product(p))))?;

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);
    for product in &products {
        let id = repo.upsert(product).await?;
        info!(%id, slug = %product.slug, "Upserted product");
    }

    info!(count = products.len(), "Product seeding complete");
    Ok(())
}

/// Upsert blog articles from a YAML list.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or the database
/// rejects an entry.
pub async fn articles(file: &Path) -> Result<(), CommandError> {
    let articles: Vec<NewArticle> = read_yaml(file).await?;
    info!(count = articles.len(), "Parsed articles");
    report(articles.iter().map(|a| (a.slug.as_str(), validate_article(a))))?;

    let pool = connect().await?;
    let repo = ArticleRepository::new(&pool);
    for article in &articles {
        let id = repo.upsert(article).await?;
        info!(%id, slug = %article.slug, "Upserted article");
    }

    info!(count = articles.len(), "Article seeding complete");
    Ok(())
}

async fn read_yaml<T: serde::de::DeserializeOwned>(file: &Path) -> Result<T, CommandError> {
    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|source| CommandError::Io {
            path: file.display().to_string(),
            source,
        })?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Log every problem, then fail if there were any.
fn report<'a>(
    results: impl Iterator<Item = (&'a str, Vec<String>)>,
) -> Result<(), CommandError> {
    let mut count = 0;
    for (slug, problems) in results {
        for problem in problems {
            error!(slug, "{problem}");
            count += 1;
        }
    }
    if count > 0 {
        return Err(CommandError::InvalidSeed { count });
    }
    Ok(())
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Problems with a product entry; empty when it can be seeded.
fn validate_product(product: &NewProduct) -> Vec<String> {
    let mut problems = Vec::new();

    if !is_valid_slug(&product.slug) {
        problems.push(format!("invalid slug '{}'", product.slug));
    }
    if product.name.trim().is_empty() {
        problems.push("name is empty".to_string());
    }
    if product.base_price <= Decimal::ZERO {
        problems.push(format!("base_price must be positive (got {})", product.base_price));
    } else if let Err(e) = product.currency.to_minor_units(product.base_price) {
        problems.push(format!("base_price: {e}"));
    }
    for option in &product.options {
        if option.name.trim().is_empty() {
            problems.push("option with empty name".to_string());
        }
        if option.values.is_empty() {
            problems.push(format!("option '{}' has no values", option.name));
        }
    }
    let mut names: Vec<&str> = product.options.iter().map(|o| o.name.as_str()).collect();
    names.sort_unstable();
    if names.windows(2).any(|w| w.first() == w.last()) {
        problems.push("duplicate option names".to_string());
    }

    problems
}

/// Problems with an article entry; empty when it can be seeded.
fn validate_article(article: &NewArticle) -> Vec<String> {
    let mut problems = Vec::new();
    if !is_valid_slug(&article.slug) {
        problems.push(format!("invalid slug '{}'", article.slug));
    }
    if article.title.trim().is_empty() {
        problems.push("title is empty".to_string());
    }
    if article.body.trim().is_empty() {
        problems.push("body is empty".to_string());
    }
    problems
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn products_yaml(yaml: &str) -> Vec<NewProduct> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_product_file() {
        let products = products_yaml(
            r#"
- slug: moon-pendant
  name: Moon Pendant
  base_price: "95.00"
  options:
    - name: Length
      values: ["40-45cm", "45-50cm"]
- slug: star-ring
  name: Star Ring
  base_price: "49.90"
  currency: RON
  in_stock: false
"#,
        );
        assert_eq!(products.len(), 2);
        assert!(products.iter().all(|p| validate_product(p).is_empty()));
        assert!(products[0].in_stock);
        assert!(!products[1].in_stock);
    }

    #[test]
    fn test_invalid_product_reports_every_problem() {
        let products = products_yaml(
            r#"
- slug: Moon Pendant
  name: " "
  base_price: "9.999"
  options:
    - name: Length
      values: []
    - name: Length
      values: ["45-50cm"]
"#,
        );
        let problems = validate_product(&products[0]);
        assert_eq!(problems.len(), 5, "{problems:?}");
    }

    #[test]
    fn test_article_validation() {
        let articles: Vec<NewArticle> = serde_yaml::from_str(
            r#"
- slug: caring-for-silver
  title: Caring for silver
  body: "Keep it dry."
  published: true
- slug: ""
  title: ""
  body: ""
"#,
        )
        .unwrap();
        assert!(validate_article(&articles[0]).is_empty());
        assert_eq!(validate_article(&articles[1]).len(), 3);
    }

    #[test]
    fn test_slug_rules() {
        assert!(is_valid_slug("moon-pendant-2"));
        assert!(!is_valid_slug("-moon"));
        assert!(!is_valid_slug("Moon"));
        assert!(!is_valid_slug(""));
    }
}
