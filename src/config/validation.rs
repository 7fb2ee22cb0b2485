use crate::config::types::{CrawlConfig, FieldSpec, PaginationSpec, Template};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_pagination(&config.pagination)?;
    validate_templates(&config.templates)?;
    Ok(())
}

/// Validates the pagination section
fn validate_pagination(pagination: &PaginationSpec) -> Result<(), ConfigError> {
    match pagination {
        PaginationSpec::None | PaginationSpec::ScrollDown { .. } => Ok(()),
        PaginationSpec::Click { next_page_selector } => {
            if next_page_selector.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "nextPageSelector cannot be empty".to_string(),
                ));
            }
            validate_selector(next_page_selector)
        }
    }
}

/// Validates template entries
///
/// Only the selected template has its fields checked; the others may be
/// half-edited in the template editor. An empty field list is allowed too.
/// Crawling with such a template is rejected by the orchestrator instead.
fn validate_templates(templates: &[Template]) -> Result<(), ConfigError> {
    let selected = templates.iter().filter(|t| t.selected).count();
    if selected > 1 {
        return Err(ConfigError::Validation(format!(
            "at most one template may be selected, found {}",
            selected
        )));
    }

    for (index, template) in templates.iter().enumerate().filter(|(_, t)| t.selected) {
        let label = template
            .name
            .clone()
            .unwrap_or_else(|| format!("#{}", index));
        validate_fields(&label, &template.fields)?;
    }

    Ok(())
}

/// Validates the fields of a single template
fn validate_fields(template: &str, fields: &[FieldSpec]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();

    for field in fields {
        if field.name.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Template '{}' has a field with an empty name",
                template
            )));
        }

        if !names.insert(field.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Template '{}' has duplicate field name '{}'",
                template, field.name
            )));
        }

        if field.selector.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Field '{}' in template '{}' has an empty selector",
                field.name, template
            )));
        }

        validate_selector(&field.selector)?;
    }

    Ok(())
}

/// Checks that a selector parses as CSS
pub fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })
}
