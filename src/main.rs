use dalite::core::db::query::{Aggregate, FilterSpec, OrderDirection, Predicate, RowSet};
use dalite::models::{NewOrder, NewUser, UserPatch};
use dalite::{config, Dal, Result, TriggerEvent};
use rusqlite::types::Value;
use tracing::info;

/// Walks the store through the canonical demonstration flow: schema,
/// seeding, reads, mutations, a deliberately failing unit of work, and a
/// row trigger. Strictly sequential; every step completes before the
/// next begins.
fn main() {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt::init();

    if let Err(err) = run() {
        eprintln!("dalite demo failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let config = config::load_config_or_default("dalite.toml")?;
    let args: Vec<String> = std::env::args().collect();
    let db_path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or_else(|| config.database_path());

    info!(path = db_path, "opening store");
    let mut dal = Dal::open_with(db_path, &config.session_options())?;

    dal.initialize_schema()?;
    for table in dal.describe()? {
        info!(
            table = table.name,
            columns = table.columns.len(),
            "schema ready"
        );
    }

    // --- Data insertion (parameter-bound, all-or-nothing per batch) ---
    let users = [
        NewUser::new("Alice", 30, "alice@example.com", Some("New York")),
        NewUser::new("Bob", 25, "bob@example.com", Some("Los Angeles")),
        NewUser::new("Charlie", 35, "charlie@example.com", Some("Chicago")),
        NewUser::new("David", 40, "david@example.com", Some("Houston")),
    ];
    match dal.seed_users(&users) {
        Ok(count) => info!(count, "user seed committed"),
        // Rerunning against an existing store trips the email uniqueness
        // constraint; the batch rolls back and the demo carries on with
        // the rows already present.
        Err(err) if err.is_constraint_violation() => {
            println!("Skipping user seed: {err}");
        }
        Err(err) => return Err(err),
    }

    println!("Users in the database:");
    print_rows(&dal.fetch("SELECT * FROM users")?);

    println!("\nUser Names and Ages:");
    print_rows(&dal.fetch("SELECT name, age FROM users")?);

    println!("\nUsers older than 30:");
    for user in dal.query_users(
        &FilterSpec::new().filter(Predicate::Gt("age".to_string(), Value::Integer(30))),
    )? {
        println!("({}, {}, {}, {})", user.id, user.name, user.age, user.email);
    }

    println!("\nUsers with email ending with '@example.com':");
    for user in dal.query_users(&FilterSpec::new().filter(Predicate::Like(
        "email".to_string(),
        "%@example.com".to_string(),
    )))? {
        println!("({}, {}, {})", user.id, user.name, user.email);
    }

    println!("\nUsers in New York or Chicago:");
    for user in dal.query_users(&FilterSpec::new().filter(Predicate::In(
        "city".to_string(),
        vec![
            Value::Text("New York".to_string()),
            Value::Text("Chicago".to_string()),
        ],
    )))? {
        println!(
            "({}, {}, {})",
            user.id,
            user.name,
            user.city.as_deref().unwrap_or("NULL")
        );
    }

    println!("\nUsers sorted by age (ascending):");
    for user in dal.query_users(&FilterSpec::new().order_by("age", OrderDirection::Ascending))? {
        println!("({}, {})", user.name, user.age);
    }

    println!("\nUsers sorted by name (descending):");
    for user in dal.query_users(&FilterSpec::new().order_by("name", OrderDirection::Descending))? {
        println!("({}, {})", user.name, user.age);
    }

    println!("\nFirst 2 users:");
    for user in dal.query_users(&FilterSpec::new().limit(2))? {
        println!("({}, {})", user.id, user.name);
    }

    // --- Updating and deleting (key-equality, affected-count results) ---
    if let Some(alice_id) = user_id_by_name(&dal, "Alice")? {
        let affected = dal.update_user(alice_id, &UserPatch::age(31))?;
        info!(affected, "updated Alice's age");
    }
    if let Some(bob_id) = user_id_by_name(&dal, "Bob")? {
        let affected = dal.delete_user(bob_id)?;
        info!(affected, "deleted Bob");
    }

    println!("\nUpdated users in the database:");
    print_rows(&dal.fetch("SELECT * FROM users")?);

    // --- Orders ---
    let orders = [
        NewOrder::new(1, "Laptop", 1),
        NewOrder::new(1, "Mouse", 2),
        NewOrder::new(3, "Keyboard", 1),
        NewOrder::new(4, "Monitor", 2),
    ];
    match dal.seed_orders(&orders) {
        Ok(count) => info!(count, "order seed committed"),
        Err(err) if err.is_constraint_violation() => {
            println!("Skipping order seed: {err}");
        }
        Err(err) => return Err(err),
    }

    println!("\nOrders in the database:");
    print_rows(&dal.fetch("SELECT * FROM orders")?);

    println!("\nUser orders (JOIN):");
    for row in dal.join_user_orders()? {
        println!("({}, {}, {})", row.name, row.product_name, row.quantity);
    }

    println!("\nUser orders (from view):");
    for row in dal.user_orders_from_view()? {
        println!("({}, {}, {})", row.name, row.product_name, row.quantity);
    }

    // --- Aggregate functions ---
    let user_count = dal.aggregate(Aggregate::Count, "users", "*")?;
    println!("\nTotal number of users: {}", show_scalar(user_count));

    let average_age = dal.aggregate(Aggregate::Avg, "users", "age")?;
    println!("Average age of users: {}", show_scalar(average_age));

    let max_age = dal.aggregate(Aggregate::Max, "users", "age")?;
    println!("Maximum age: {}", show_scalar(max_age));

    let total_quantity = dal.aggregate(Aggregate::Sum, "orders", "quantity")?;
    println!("Total quantity of all orders: {}", show_scalar(total_quantity));

    // --- GROUP BY and HAVING ---
    println!("\nNumber of orders per user:");
    for group in dal.group_order_counts(None)? {
        println!("({}, {})", group.name, group.count);
    }

    println!("\nUsers with more than 1 order:");
    for group in dal.group_order_counts(Some(1))? {
        println!("({}, {})", group.name, group.count);
    }

    // --- Transactions (all or nothing) ---
    let outcome = dal.run_transaction(|tx| {
        Dal::insert_user_tx(
            tx,
            &NewUser::new("Eve", 28, "eve@newdomain.com", Some("Miami")),
        )?;
        // Order for a user key that does not exist; the referential
        // constraint fails and the whole unit rolls back.
        Dal::insert_order_tx(tx, &NewOrder::new(999, "Tablet", 1))?;
        Ok(())
    });
    match outcome {
        Ok(()) => println!("Transaction committed successfully."),
        Err(err) => println!("Transaction rolled back due to error: {err}"),
    }

    println!("\nUsers after (possible) failed transaction:");
    print_rows(&dal.fetch("SELECT * FROM users")?);

    println!("\nOrders after (possible) failed transaction:");
    print_rows(&dal.fetch("SELECT * FROM orders")?);

    // --- Trigger ---
    // Re-applies the value the update already set; kept as a literal
    // reproduction of the script's store-automation demonstration.
    dal.define_row_trigger(
        "update_user_age",
        &TriggerEvent::AfterUpdateOf {
            table: "users".to_string(),
            column: "age".to_string(),
        },
        "UPDATE users SET age = NEW.age WHERE id = OLD.id",
    )?;

    dal.close()?;
    info!("store closed");
    Ok(())
}

/// Resolves a user's identity key by name, for the demo steps that
/// address rows by name rather than by key.
fn user_id_by_name(dal: &Dal, name: &str) -> Result<Option<i64>> {
    let matches = dal.query_users(
        &FilterSpec::new().filter(Predicate::Eq("name".to_string(), Value::Text(name.to_string()))),
    )?;
    Ok(matches.first().map(|user| user.id))
}

fn print_rows(rows: &RowSet) {
    for row in &rows.rows {
        println!("({})", row.join(", "));
    }
}

fn show_scalar(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "NULL".to_string(),
    }
}
