//! Record types for the two collections and the projections read from
//! them. Identity keys are issued by the store, so insert payloads
//! (`NewUser`, `NewOrder`) carry no key.

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: i64,
    /// Globally unique across the collection (store-enforced)
    pub email: String,
    pub city: Option<String>,
}

/// Insert payload for a user; the store issues the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub age: i64,
    pub email: String,
    pub city: Option<String>,
}

impl NewUser {
    pub fn new(name: &str, age: i64, email: &str, city: Option<&str>) -> Self {
        NewUser {
            name: name.to_string(),
            age,
            email: email.to_string(),
            city: city.map(String::from),
        }
    }
}

/// A row of the `orders` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: i64,
    /// References `users.id`; checked when foreign keys are enforced
    pub user_id: i64,
    pub product_name: String,
    pub quantity: i64,
}

/// Insert payload for an order; the store issues the order_id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: i64,
    pub product_name: String,
    pub quantity: i64,
}

impl NewOrder {
    pub fn new(user_id: i64, product_name: &str, quantity: i64) -> Self {
        NewOrder {
            user_id,
            product_name: product_name.to_string(),
            quantity,
        }
    }
}

/// One (user, product, quantity) triple from the inner join or the
/// derived view.
#[derive(Debug, Clone, PartialEq)]
pub struct UserOrderRow {
    pub name: String,
    pub product_name: String,
    pub quantity: i64,
}

/// Per-user order count from the grouped read.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderCount {
    pub name: String,
    pub count: i64,
}

/// Partial update for a single user row. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub email: Option<String>,
    pub city: Option<String>,
}

impl UserPatch {
    pub fn age(age: i64) -> Self {
        UserPatch {
            age: Some(age),
            ..UserPatch::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.age.is_none() && self.email.is_none() && self.city.is_none()
    }
}
