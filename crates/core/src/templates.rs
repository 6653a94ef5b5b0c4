//! Static catalogue of the analytical queries exposed as tools.
//!
//! Each [`QueryTemplate`] pairs a tool identifier with query text containing
//! `{name}` placeholders and one [`ParameterRule`] per placeholder. The store is
//! built once at startup and never mutated afterwards.

use serde_json::{json, Map, Value};

use crate::binder::placeholder_names;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    /// ASCII digits only, in `1..=max`.
    PositiveInteger { max: u32 },
    /// 1-64 characters drawn from `[A-Za-z0-9_-]`.
    Identifier,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterRule {
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
    pub default: Option<String>,
}

impl ParameterRule {
    pub fn required(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ParameterKind,
    ) -> Self {
        Self { name: name.into(), description: description.into(), kind, default: None }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: ParameterKind,
        default: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind,
            default: Some(default.into()),
        }
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTemplate {
    pub tool_id: String,
    pub description: String,
    pub body: String,
    pub parameters: Vec<ParameterRule>,
}

impl QueryTemplate {
    pub fn new(
        tool_id: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            tool_id: tool_id.into(),
            description: description.into(),
            body: body.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, rule: ParameterRule) -> Self {
        self.parameters.push(rule);
        self
    }

    pub fn rule(&self, name: &str) -> Option<&ParameterRule> {
        self.parameters.iter().find(|rule| rule.name == name)
    }

    /// Distinct placeholder names in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in placeholder_names(&self.body) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Tool schema in the shape the gateway target registration and the agent
    /// tool list both consume.
    pub fn tool_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for name in self.placeholders() {
            let description = match self.rule(name) {
                Some(rule) => match &rule.default {
                    Some(default) => format!("{} (default: {default})", rule.description),
                    None => rule.description.clone(),
                },
                None => String::new(),
            };
            properties
                .insert(name.to_string(), json!({ "type": "string", "description": description }));

            if self.rule(name).map(ParameterRule::is_required).unwrap_or(true) {
                required.push(Value::String(name.to_string()));
            }
        }

        json!({
            "name": self.tool_id,
            "description": self.description,
            "inputSchema": {
                "type": "object",
                "properties": properties,
                "required": required,
            }
        })
    }
}

#[derive(Clone, Debug)]
pub struct TemplateStore {
    templates: Vec<QueryTemplate>,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateStore {
    pub fn new(templates: Vec<QueryTemplate>) -> Self {
        let mut store = Self { templates: Vec::with_capacity(templates.len()) };
        for template in templates {
            store.insert(template);
        }
        store
    }

    /// Replaces any existing template with the same tool id.
    fn insert(&mut self, template: QueryTemplate) {
        match self.templates.iter_mut().find(|existing| existing.tool_id == template.tool_id) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    pub fn lookup(&self, tool_id: &str) -> Option<&QueryTemplate> {
        self.templates.iter().find(|template| template.tool_id == tool_id)
    }

    pub fn catalog(&self) -> impl Iterator<Item = &QueryTemplate> {
        self.templates.iter()
    }

    pub fn tool_ids(&self) -> Vec<&str> {
        self.templates.iter().map(|template| template.tool_id.as_str()).collect()
    }

    pub fn tool_schemas(&self) -> Vec<Value> {
        self.templates.iter().map(QueryTemplate::tool_schema).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn builtin() -> Self {
        let months = || {
            ParameterRule::required(
                "months",
                "Number of months to analyze (e.g., '3', '6', '12')",
                ParameterKind::PositiveInteger { max: MAX_MONTHS },
            )
        };

        Self::new(vec![
            QueryTemplate::new(
                "get_sales_summary",
                "Get a summary of sales data for the last 6 months, grouped by month",
                SALES_SUMMARY_SQL,
            ),
            QueryTemplate::new(
                "get_top_customers",
                "Get top customers by lifetime value with their order statistics",
                TOP_CUSTOMERS_SQL,
            )
            .with_parameter(ParameterRule::optional(
                "limit",
                "Number of top customers to return",
                ParameterKind::PositiveInteger { max: MAX_LIMIT },
                "10",
            )),
            QueryTemplate::new(
                "get_product_performance",
                "Get product performance metrics including units sold and revenue",
                PRODUCT_PERFORMANCE_SQL,
            )
            .with_parameter(months())
            .with_parameter(ParameterRule::optional(
                "limit",
                "Number of products to return",
                ParameterKind::PositiveInteger { max: MAX_LIMIT },
                "20",
            )),
            QueryTemplate::new(
                "get_regional_breakdown",
                "Get sales breakdown by region with customer and revenue metrics",
                REGIONAL_BREAKDOWN_SQL,
            )
            .with_parameter(months()),
            QueryTemplate::new(
                "get_inventory_status",
                "Get current inventory status for a specific warehouse",
                INVENTORY_STATUS_SQL,
            )
            .with_parameter(ParameterRule::required(
                "warehouse_id",
                "The warehouse ID to check inventory for",
                ParameterKind::Identifier,
            )),
            QueryTemplate::new(
                "get_order_details",
                "Get detailed information about a specific order including line items",
                ORDER_DETAILS_SQL,
            )
            .with_parameter(ParameterRule::required(
                "order_id",
                "The order ID to retrieve details for",
                ParameterKind::Identifier,
            )),
        ])
    }
}

const MAX_MONTHS: u32 = 120;
const MAX_LIMIT: u32 = 1000;

const SALES_SUMMARY_SQL: &str = "
SELECT
    DATE_TRUNC('month', order_date) AS month,
    SUM(total_amount) AS total_sales,
    COUNT(DISTINCT order_id) AS order_count
FROM sales_table
WHERE order_date >= DATE_ADD('month', -6, CURRENT_DATE)
GROUP BY DATE_TRUNC('month', order_date)
ORDER BY month DESC
";

const TOP_CUSTOMERS_SQL: &str = "
SELECT
    customer_id,
    customer_name,
    SUM(total_amount) AS lifetime_value,
    COUNT(order_id) AS order_count
FROM sales_table
WHERE order_date >= DATE_ADD('year', -1, CURRENT_DATE)
GROUP BY customer_id, customer_name
ORDER BY lifetime_value DESC
LIMIT {limit}
";

const PRODUCT_PERFORMANCE_SQL: &str = "
SELECT
    product_id,
    product_name,
    SUM(quantity) AS units_sold,
    SUM(total_amount) AS revenue,
    AVG(unit_price) AS avg_price
FROM sales_table
WHERE order_date >= DATE_ADD('month', -{months}, CURRENT_DATE)
GROUP BY product_id, product_name
ORDER BY revenue DESC
LIMIT {limit}
";

const REGIONAL_BREAKDOWN_SQL: &str = "
SELECT
    region,
    COUNT(DISTINCT customer_id) AS unique_customers,
    SUM(total_amount) AS total_revenue,
    AVG(total_amount) AS avg_order_value
FROM sales_table
WHERE order_date >= DATE_ADD('month', -{months}, CURRENT_DATE)
GROUP BY region
ORDER BY total_revenue DESC
";

const INVENTORY_STATUS_SQL: &str = "
SELECT
    product_id,
    product_name,
    current_stock,
    reorder_level,
    CASE
        WHEN current_stock <= reorder_level THEN 'LOW'
        WHEN current_stock <= reorder_level * 1.5 THEN 'MEDIUM'
        ELSE 'GOOD'
    END AS stock_status
FROM inventory_table
WHERE warehouse_id = '{warehouse_id}'
ORDER BY stock_status, current_stock ASC
";

const ORDER_DETAILS_SQL: &str = "
SELECT
    o.order_id,
    o.order_date,
    o.customer_name,
    o.total_amount,
    o.status,
    oi.product_name,
    oi.quantity,
    oi.unit_price
FROM orders_table o
JOIN order_items_table oi ON o.order_id = oi.order_id
WHERE o.order_id = '{order_id}'
";

#[cfg(test)]
mod tests {
    use super::{ParameterKind, ParameterRule, QueryTemplate, TemplateStore};

    #[test]
    fn builtin_store_exposes_the_six_analytics_tools_in_order() {
        let store = TemplateStore::builtin();

        assert_eq!(
            store.tool_ids(),
            vec![
                "get_sales_summary",
                "get_top_customers",
                "get_product_performance",
                "get_regional_breakdown",
                "get_inventory_status",
                "get_order_details",
            ]
        );
    }

    #[test]
    fn every_placeholder_has_exactly_one_rule() {
        for template in TemplateStore::builtin().catalog() {
            let placeholders = template.placeholders();
            assert_eq!(
                placeholders.len(),
                template.parameters.len(),
                "{} should declare one rule per placeholder",
                template.tool_id
            );
            for name in placeholders {
                assert!(template.rule(name).is_some(), "{} lacks a rule for {name}", template.tool_id);
            }
        }
    }

    #[test]
    fn unknown_tool_lookup_returns_none() {
        assert!(TemplateStore::builtin().lookup("drop_all_tables").is_none());
    }

    #[test]
    fn tool_schema_lists_only_parameters_without_defaults_as_required() {
        let store = TemplateStore::builtin();
        let schema = store.lookup("get_product_performance").expect("template").tool_schema();

        assert_eq!(schema["name"], "get_product_performance");
        assert_eq!(schema["inputSchema"]["type"], "object");
        assert_eq!(schema["inputSchema"]["required"], serde_json::json!(["months"]));
        assert_eq!(schema["inputSchema"]["properties"]["limit"]["type"], "string");
        assert!(schema["inputSchema"]["properties"]["limit"]["description"]
            .as_str()
            .unwrap_or_default()
            .contains("(default: 20)"));
    }

    #[test]
    fn parameterless_tool_schema_has_empty_properties() {
        let store = TemplateStore::builtin();
        let schema = store.lookup("get_sales_summary").expect("template").tool_schema();

        assert_eq!(schema["inputSchema"]["properties"], serde_json::json!({}));
        assert_eq!(schema["inputSchema"]["required"], serde_json::json!([]));
    }

    #[test]
    fn inserting_a_duplicate_tool_id_replaces_the_template() {
        let store = TemplateStore::new(vec![
            QueryTemplate::new("t", "first", "SELECT 1"),
            QueryTemplate::new("t", "second", "SELECT {n}").with_parameter(
                ParameterRule::required("n", "n", ParameterKind::PositiveInteger { max: 5 }),
            ),
        ]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup("t").map(|t| t.description.as_str()), Some("second"));
    }

    #[test]
    fn placeholders_are_deduplicated_in_first_occurrence_order() {
        let template = QueryTemplate::new("t", "", "SELECT {b}, {a}, {b} FROM x LIMIT {c}");
        assert_eq!(template.placeholders(), vec!["b", "a", "c"]);
    }
}
