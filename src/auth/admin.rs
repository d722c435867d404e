//! Bootstrapping the first admin and the admin-only ping endpoint.

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use rusqlite::{Connection, TransactionBehavior};
use serde_json::{Value, json};

use crate::{
    Error,
    auth::{
        AuthUser, CredentialsForm, PasswordHash, RegistrationState, Role, UserID,
        ValidatedPassword, count_admins, create_user, get_user_by_phone, set_role,
    },
    json_body,
};

/// What [init_first_admin] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminInitOutcome {
    /// An admin already existed so nothing changed.
    AlreadyInitialized,
    /// An existing member was made an admin.
    Promoted(UserID),
    /// A new admin account was created.
    Created(UserID),
}

/// Make sure the ledger has an admin.
///
/// Does nothing if any admin exists. Otherwise promotes the member registered with
/// `phone`, or creates a new admin with `phone` and `password` if nobody has registered it.
/// The password is only used, and checked for strength, when a new admin is created.
///
/// # Errors
/// Returns [Error::Validation] if `phone` or `password` is blank, [Error::TooWeak] if a new
/// admin would get a weak password, or an [Error::SqlError] if a query failed.
pub fn init_first_admin(
    phone: &str,
    password: &str,
    password_hash_cost: u32,
    connection: &mut Connection,
) -> Result<AdminInitOutcome, Error> {
    let (phone, password) = CredentialsForm {
        phone: phone.to_owned(),
        password: password.to_owned(),
    }
    .normalized()?;

    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if count_admins(&transaction)? > 0 {
        return Ok(AdminInitOutcome::AlreadyInitialized);
    }

    let outcome = match get_user_by_phone(&phone, &transaction) {
        Ok(user) => {
            set_role(user.id, Role::Admin, &transaction)?;
            AdminInitOutcome::Promoted(user.id)
        }
        Err(Error::NotFound) => {
            let password = ValidatedPassword::new(&password, &[&phone])?;
            let password_hash = PasswordHash::new(password, password_hash_cost)?;
            let user = create_user(&phone, password_hash, Role::Admin, &transaction)?;
            AdminInitOutcome::Created(user.id)
        }
        Err(error) => return Err(error),
    };

    transaction.commit()?;

    match outcome {
        AdminInitOutcome::Promoted(id) => tracing::info!("promoted user {id} to admin"),
        AdminInitOutcome::Created(id) => tracing::info!("created admin user {id}"),
        AdminInitOutcome::AlreadyInitialized => {}
    }

    Ok(outcome)
}

/// A route handler that creates the first admin if there is none.
///
/// Responds with `{"status": "ok"}` whether or not an admin was created, so the endpoint
/// does not reveal which phone numbers are registered.
pub async fn init_admin_endpoint(
    State(state): State<RegistrationState>,
    payload: Result<Json<CredentialsForm>, JsonRejection>,
) -> Result<Json<Value>, Error> {
    let form = json_body(payload)?;
    let mut connection = state.database.connect()?;

    init_first_admin(
        &form.phone,
        &form.password,
        state.password_hash_cost,
        &mut connection,
    )?;

    Ok(Json(json!({ "status": "ok" })))
}

/// A route handler that lets admins check their token works.
pub async fn admin_ping(Extension(user): Extension<AuthUser>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "role": user.role,
        "phone": user.phone,
    }))
}

#[cfg(test)]
mod init_first_admin_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        auth::{
            PasswordHash, Role,
            admin::{AdminInitOutcome, init_first_admin},
            count_admins, create_user, get_user_by_phone,
        },
        db::initialize,
    };

    const PASSWORD: &str = "averysafeandsecurepassword";

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn creates_admin_when_none_exists() {
        let mut connection = get_test_connection();

        let outcome = init_first_admin("0912345678", PASSWORD, 4, &mut connection).unwrap();

        assert!(matches!(outcome, AdminInitOutcome::Created(_)));
        let admin = get_user_by_phone("0912345678", &connection).unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(admin.password_hash.verify(PASSWORD).unwrap());
    }

    #[test]
    fn promotes_existing_member() {
        let mut connection = get_test_connection();
        let member = create_user(
            "0912345678",
            PasswordHash::new_unchecked("hunter2"),
            Role::Member,
            &connection,
        )
        .unwrap();

        let outcome = init_first_admin("0912345678", PASSWORD, 4, &mut connection).unwrap();

        assert_eq!(outcome, AdminInitOutcome::Promoted(member.id));
        let admin = get_user_by_phone("0912345678", &connection).unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.password_hash, member.password_hash);
    }

    #[test]
    fn does_nothing_once_an_admin_exists() {
        let mut connection = get_test_connection();
        init_first_admin("0912345678", PASSWORD, 4, &mut connection).unwrap();

        let outcome = init_first_admin("0987654321", PASSWORD, 4, &mut connection).unwrap();

        assert_eq!(outcome, AdminInitOutcome::AlreadyInitialized);
        assert_eq!(count_admins(&connection), Ok(1));
        assert_eq!(
            get_user_by_phone("0987654321", &connection),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn rejects_blank_input() {
        let mut connection = get_test_connection();

        let result = init_first_admin(" ", PASSWORD, 4, &mut connection);

        assert_eq!(
            result,
            Err(Error::Validation(
                "phone and password are required".to_owned()
            ))
        );
        assert_eq!(count_admins(&connection), Ok(0));
    }
}
