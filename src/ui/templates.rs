// Askama template definitions

use askama::Template;

use crate::db::{Order, Product};

/// Custom filters for Askama templates
mod filters {
    /// Render a price with two decimals
    pub fn money<T: std::fmt::Display>(value: T) -> ::askama::Result<String> {
        Ok(format!("{:.2}", value))
    }
}

// Login template
#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub error: Option<String>,
    pub version: String,
}

// Registration template
#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub error: Option<String>,
    pub version: String,
}

// Signed-in landing page
#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub username: String,
    pub version: String,
}

// One user's products
#[derive(Template)]
#[template(path = "user_products.html")]
pub struct UserProductsTemplate {
    pub username: String,
    pub products: Vec<Product>,
    pub version: String,
}

// Admin overview of every product and order
#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub username: String,
    pub products: Vec<Product>,
    pub orders: Vec<Order>,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::filters;

    #[test]
    fn test_money_filter() {
        assert_eq!(filters::money(9.999).unwrap(), "10.00");
        assert_eq!(filters::money(1.5).unwrap(), "1.50");
        assert_eq!(filters::money(&2.0).unwrap(), "2.00");
    }
}
