use std::{error::Error, io, process::exit};

use clap::Parser;

use rescue_ledger::{
    Database, DatabaseConfig,
    auth::{AdminInitOutcome, PasswordHash, init_first_admin},
};

/// A utility for creating the first admin of the pet-rescue ledger.
///
/// If a member has already registered with the phone number they are promoted,
/// otherwise a new admin is created. Nothing changes if an admin already exists.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    database: DatabaseConfig,

    /// The phone number of the first admin.
    #[arg(long, env = "ADMIN_INIT_PHONE")]
    phone: String,

    /// The password of the first admin. Prompted for if omitted.
    #[arg(long, env = "ADMIN_INIT_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let password = if args.password.is_empty() {
        match prompt_password() {
            Some(password) => password,
            None => return Ok(()),
        }
    } else {
        args.password
    };

    let database = Database::open(&args.database.db_path)?;
    let mut connection = database.connect()?;

    match init_first_admin(
        &args.phone,
        &password,
        PasswordHash::DEFAULT_COST,
        &mut connection,
    ) {
        Ok(AdminInitOutcome::AlreadyInitialized) => {
            println!("An admin already exists, nothing was changed.")
        }
        Ok(AdminInitOutcome::Promoted(id)) => {
            println!("Promoted user {id} ({}) to admin.", args.phone.trim())
        }
        Ok(AdminInitOutcome::Created(id)) => {
            println!("Created admin user {id} ({}).", args.phone.trim())
        }
        Err(error) => {
            eprintln!("Could not initialize the admin: {error}");
            exit(1);
        }
    }

    Ok(())
}

fn prompt_password() -> Option<String> {
    loop {
        let first_password = match rpassword::prompt_password("Enter the admin password: ") {
            Ok(password) => password,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => return None,
            Err(error) => {
                eprintln!("Could not read password from stdin: {error}");
                return None;
            }
        };

        let second_password = match rpassword::prompt_password("Enter the same password again: ")
        {
            Ok(password) => password,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => return None,
            Err(error) => {
                eprintln!("Could not read password from stdin: {error}");
                return None;
            }
        };

        if first_password == second_password {
            return Some(first_password);
        }

        eprintln!("Passwords did not match, try again.");
    }
}
