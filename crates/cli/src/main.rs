use clap::{Parser, Subcommand};
use corridor_api_rest::HttpAdvisoryClient;
use corridor_core::pendency::{self, Bucket, Resolution};
use corridor_core::transfer::TransferRequest;
use corridor_core::{
    ConfigValues, CoreConfig, CorridorResult, CorridorService, JsonFileStore, ListQuery,
    NewPatient, Outcome, Patient, PatientEdit, PatientId, Situation, Status, View,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "corridor")]
#[command(about = "Corridor patient tracker CLI")]
struct Cli {
    /// Patient data directory (overrides PATIENT_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List patients
    List {
        /// active, history, transferQueue or transferEligible
        #[arg(long, default_value = "active")]
        view: String,
        /// Name or medical record fragment
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        specialty: Option<String>,
    },
    /// Admit a patient to the corridor
    Admit {
        name: String,
        #[arg(long, default_value = "")]
        medical_record: String,
        #[arg(long)]
        age: Option<u16>,
        #[arg(long, default_value = "")]
        corridor: String,
        #[arg(long, default_value = "")]
        specialty: String,
        #[arg(long, default_value = "")]
        diagnosis: String,
        /// stretcher or chair
        #[arg(long, default_value = "stretcher")]
        situation: String,
        /// Venous access date as DD/MM
        #[arg(long, default_value = "")]
        venous_access: String,
    },
    /// Edit status, situation or pendency
    Edit {
        id: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        situation: Option<String>,
        #[arg(long)]
        pendency: Option<String>,
        #[arg(long)]
        venous_access: Option<String>,
    },
    /// Permanently delete a patient
    Delete { id: String },
    /// Show the pendency board
    Board,
    /// Apply a pendency resolution
    Resolve {
        id: String,
        /// safety, diet, prescription, exams, socialWorker or finalizeDischarge
        action: String,
        /// Diet tags (comma-separated), for the diet action
        #[arg(long)]
        diet: Option<String>,
    },
    /// Request a transfer to a ward sector and bed
    RequestTransfer {
        id: String,
        sector: String,
        bed: String,
    },
    /// Finalize a transfer
    FinalizeTransfer {
        id: String,
        /// Receiving facility, for external transfers
        #[arg(long)]
        destination: Option<String>,
    },
    /// Cancel a requested transfer
    CancelTransfer { id: String },
    /// Discharge and finalize several patients
    BulkDischarge {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Permanently delete several patients
    BulkDelete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Corridor statistics
    Stats,
    /// Active patients whose venous access is due for replacement
    StaleAccess,
    /// Shift handover narrative for one corridor (needs CORRIDOR_ADVISORY_URL)
    Handover { corridor: String },
}

fn service(data_dir: Option<String>) -> CorridorResult<CorridorService> {
    let values = ConfigValues {
        patient_data_dir: data_dir.or_else(|| std::env::var("PATIENT_DATA_DIR").ok()),
        venous_access_hours: std::env::var("CORRIDOR_VENOUS_ACCESS_HOURS").ok(),
        new_record_ttl_secs: std::env::var("CORRIDOR_NEW_RECORD_TTL_SECS").ok(),
        advisory_timeout_secs: std::env::var("CORRIDOR_ADVISORY_TIMEOUT_SECS").ok(),
    };
    let cfg = Arc::new(CoreConfig::from_values(values)?);
    let store = Arc::new(JsonFileStore::open(&cfg)?);
    let mut service = CorridorService::new(cfg.clone(), store);
    if let Some(url) = std::env::var("CORRIDOR_ADVISORY_URL")
        .ok()
        .filter(|u| !u.trim().is_empty())
    {
        let client = HttpAdvisoryClient::new(&url, cfg.advisory_timeout())?;
        service = service.with_advisory(Arc::new(client));
    }
    Ok(service)
}

fn handover_text(service: &CorridorService, corridor: &str) -> anyhow::Result<String> {
    let runtime = tokio::runtime::Runtime::new()?;
    let text = runtime.block_on(service.handover(corridor))?;
    Ok(text.unwrap_or_else(|| format!("No handover available for {}.", corridor.trim())))
}

fn print_patient(p: &Patient) {
    let destination = match (&p.transfer.destination_sector, &p.transfer.destination_bed) {
        (Some(sector), Some(bed)) => format!(" -> {sector}/{bed}"),
        (None, Some(bed)) => format!(" -> {bed}"),
        _ => String::new(),
    };
    println!(
        "ID: {}, Name: {}, Record: {}, Status: {}, Situation: {}, Pendency: {}{}",
        p.id, p.name, p.medical_record, p.status, p.situation, p.pendency, destination
    );
}

fn print_outcome(what: &str, id: &str, result: CorridorResult<Outcome>) {
    match result {
        Ok(Outcome::Applied) => println!("{} applied to {}", what, id),
        Ok(Outcome::Unchanged) => println!("{}: {} already up to date", what, id),
        Ok(Outcome::NotFound) => println!("{}: no patient {}", what, id),
        Err(e) => eprintln!("Error ({}): {}", what, e),
    }
}

fn ids(raw: Vec<String>) -> Vec<PatientId> {
    raw.into_iter().map(PatientId::new).collect()
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("corridor_core=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'corridor --help' for commands");
        return Ok(());
    };
    let service = service(cli.data_dir)?;

    match command {
        Commands::List {
            view,
            search,
            specialty,
        } => {
            let view: View = view.parse()?;
            let patients = service.list(&ListQuery {
                view,
                search,
                specialty,
            })?;
            if patients.is_empty() {
                println!("No patients found.");
            }
            for patient in &patients {
                print_patient(patient);
            }
        }
        Commands::Admit {
            name,
            medical_record,
            age,
            corridor,
            specialty,
            diagnosis,
            situation,
            venous_access,
        } => {
            let situation: Situation = situation.parse()?;
            let input = NewPatient {
                name,
                medical_record,
                age,
                corridor,
                specialty,
                diagnosis,
                situation,
                venous_access,
                ..Default::default()
            };
            match service.admit(input) {
                Ok(patient) => println!("Admitted patient with ID: {}", patient.id),
                Err(e) => eprintln!("Error admitting patient: {}", e),
            }
        }
        Commands::Edit {
            id,
            status,
            situation,
            pendency,
            venous_access,
        } => {
            let edit = PatientEdit {
                status: status.map(|s| s.parse::<Status>()).transpose()?,
                situation: situation.map(|s| s.parse()).transpose()?,
                pendency: pendency.map(|s| s.parse()).transpose()?,
                venous_access,
                ..Default::default()
            };
            print_outcome("edit", &id, service.edit(&PatientId::new(&id), edit));
        }
        Commands::Delete { id } => {
            print_outcome("delete", &id, service.delete(&PatientId::new(&id)));
        }
        Commands::Board => {
            let board = service.pendency_board()?;
            for bucket in [
                Bucket::Safety,
                Bucket::Exams,
                Bucket::Prescription,
                Bucket::Admin,
            ] {
                let patients = board.bucket(bucket);
                println!("[{}] {}", bucket.as_str(), patients.len());
                for p in patients {
                    let next = pendency::suggested_resolution(p)
                        .map(|r| r.name())
                        .unwrap_or("-");
                    println!("  {} {} (next: {})", p.id, p.name, next);
                }
            }
            println!("{} patients with open items", board.distinct_len());
        }
        Commands::Resolve { id, action, diet } => {
            let diet: Vec<String> = diet
                .map(|d| d.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default();
            let resolution = Resolution::from_action(&action, diet)?;
            print_outcome(
                &format!("resolve {}", resolution.name()),
                &id,
                service.resolve(&PatientId::new(&id), resolution),
            );
        }
        Commands::RequestTransfer { id, sector, bed } => {
            let request = TransferRequest::new(&sector, &bed)?;
            print_outcome(
                "request transfer",
                &id,
                service.request_transfer(&PatientId::new(&id), &request),
            );
        }
        Commands::FinalizeTransfer { id, destination } => {
            print_outcome(
                "finalize transfer",
                &id,
                service.finalize_transfer(&PatientId::new(&id), destination.as_deref()),
            );
        }
        Commands::CancelTransfer { id } => {
            print_outcome(
                "cancel transfer",
                &id,
                service.cancel_transfer(&PatientId::new(&id)),
            );
        }
        Commands::BulkDischarge { ids: raw } => match service.bulk_discharge(&ids(raw)) {
            Ok(report) => {
                println!("Discharged: {}", report.discharged.len());
                println!("Already finalized: {}", report.already_finalized.len());
                for id in &report.missing {
                    println!("Missing: {}", id);
                }
                for id in &report.bypassed_admin_gate {
                    println!("Discharged with open social work: {}", id);
                }
            }
            Err(e) => eprintln!("Error discharging patients: {}", e),
        },
        Commands::BulkDelete { ids: raw } => match service.bulk_delete(&ids(raw)) {
            Ok(report) => {
                println!("Deleted: {}", report.deleted.len());
                for id in &report.missing {
                    println!("Missing: {}", id);
                }
            }
            Err(e) => eprintln!("Error deleting patients: {}", e),
        },
        Commands::Stats => {
            let stats = service.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::StaleAccess => {
            let patients = service.stale_venous_access()?;
            if patients.is_empty() {
                println!("No venous access due for replacement.");
            }
            for p in &patients {
                println!("{} {} (access {})", p.id, p.name, p.venous_access);
            }
        }
        Commands::Handover { corridor } => {
            println!("{}", handover_text(&service, &corridor)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corridor_core::MemoryStore;

    #[test]
    fn handover_takes_the_corridor_as_argument() {
        let cli = Cli::try_parse_from(["corridor", "handover", "Corridor 1"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Handover { corridor }) if corridor == "Corridor 1"
        ));
        assert!(Cli::try_parse_from(["corridor", "handover"]).is_err());
    }

    #[test]
    fn handover_without_advisory_says_so() {
        let cfg = Arc::new(CoreConfig::with_defaults("patient_data").unwrap());
        let service = CorridorService::new(cfg, Arc::new(MemoryStore::new()));
        service
            .admit(NewPatient {
                name: "Ana".into(),
                corridor: "Corridor 1".into(),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(
            handover_text(&service, " Corridor 1 ").unwrap(),
            "No handover available for Corridor 1."
        );
        assert!(handover_text(&service, "  ").is_err());
    }
}
