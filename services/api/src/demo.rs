use crate::infra::{service_user, InMemoryLeasingBackend, RecordingNotifier};
use clap::Args;
use std::sync::Arc;

use lease_desk::error::AppError;
use lease_desk::workflows::tenancy::{
    stock_clauses, DirectoryClient, FinishOutcome, RentCycle, RentTerms, SignatureAttempt,
    StepOutcome, TenancyWizard, TenantQuery, WizardDraft, WizardStep, WizardStore,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Rent amount for the demo tenancy
    #[arg(long, default_value_t = 15_000.0)]
    pub(crate) rent_amount: f64,
    /// Rent cycle: monthly, quarterly, or yearly
    #[arg(long, default_value = "monthly", value_parser = parse_cycle)]
    pub(crate) cycle: RentCycle,
    /// Day of the month rent falls due (1-28)
    #[arg(long, default_value_t = 5)]
    pub(crate) due_date_day: u8,
    /// Skip the clause-edit detour that supersedes the first agreement
    #[arg(long)]
    pub(crate) skip_supersede: bool,
    /// Also demonstrate recovery from an agreement deleted server side
    #[arg(long)]
    pub(crate) show_recovery: bool,
}

fn parse_cycle(raw: &str) -> Result<RentCycle, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "monthly" => Ok(RentCycle::Monthly),
        "quarterly" => Ok(RentCycle::Quarterly),
        "yearly" => Ok(RentCycle::Yearly),
        other => Err(format!("unknown rent cycle '{other}'")),
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        rent_amount,
        cycle,
        due_date_day,
        skip_supersede,
        show_recovery,
    } = args;

    let backend = Arc::new(InMemoryLeasingBackend::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let user = service_user();

    println!("Tenancy onboarding demo");
    println!("Landlord: {} ({})", user.full_name(), user.id.0);

    let units = backend
        .units_for_owner(&user.id)
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;
    let tenants = backend
        .tenants(TenantQuery::default())
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;

    println!("\nAvailable units");
    for unit in &units {
        println!(
            "- {} | {}{}",
            unit.id.0,
            unit.title,
            unit.address_line
                .as_deref()
                .map(|line| format!(" | {line}"))
                .unwrap_or_default()
        );
    }
    println!("Registered tenants");
    for tenant in &tenants {
        println!(
            "- {} | {}{}",
            tenant.id.0,
            tenant.full_name(),
            tenant
                .email
                .as_deref()
                .map(|email| format!(" | {email}"))
                .unwrap_or_default()
        );
    }

    let unit = units.first().cloned();
    let tenant = tenants.first().cloned();

    let mut wizard = TenancyWizard::new(
        user.clone(),
        backend.clone(),
        backend.clone(),
        notifier.clone(),
    );

    wizard.select_unit(unit);
    wizard.select_tenant(tenant);
    wizard.confirm_parties()?;
    println!(
        "\nStep {} reached: {}",
        wizard.step().index(),
        wizard.step().label()
    );

    let rent = RentTerms {
        amount: rent_amount,
        cycle,
        due_date_day: Some(due_date_day),
        utilities_included: Some(false),
    };
    wizard.submit_rent_terms(rent, None)?;
    println!(
        "Step {} reached: {}",
        wizard.step().index(),
        wizard.step().label()
    );

    let outcome = wizard.submit_clauses(stock_clauses(), None, None).await?;
    print_outcome("Clauses submitted", outcome);
    let first_agreement = wizard.store().agreement_id().cloned();
    if let Some(agreement) = wizard.agreement() {
        println!(
            "Agreement {} created | status {} | {} signer(s) pending",
            agreement.id.0,
            agreement.status.label(),
            agreement
                .signers
                .iter()
                .filter(|signer| !signer.has_signed())
                .count()
        );
    }

    if !skip_supersede {
        println!("\nEditing a clause and resubmitting (supersedes the draft agreement)");
        wizard.back_to_clauses()?;
        let mut clauses = stock_clauses();
        clauses[0]
            .text
            .push_str(" Payment is accepted by bank transfer only.");
        let outcome = wizard.submit_clauses(clauses, None, None).await?;
        print_outcome("Clauses resubmitted", outcome);
        if let (Some(old), Some(new)) = (first_agreement, wizard.store().agreement_id()) {
            println!(
                "Agreement {} replaced by {} | {} document(s) on the backend",
                old.0,
                new.0,
                backend.agreement_count()
            );
        }
    }

    println!("\nSigning as {}", user.full_name());
    wizard.proceed_to_sign(SignatureAttempt::new(user.full_name(), true))?;
    println!("Signature validated, awaiting explicit confirmation");
    let outcome = wizard.confirm_sign().await?;
    print_outcome("Signature confirmed", outcome);
    if let Some(agreement) = wizard.agreement() {
        println!("Agreement status: {}", agreement.status.label());
    }

    let outcome = wizard.create_tenancy().await?;
    match outcome {
        FinishOutcome::Created(tenancy) => {
            println!("\nTenancy {} created", tenancy.id.0);
            match serde_json::to_string_pretty(&tenancy) {
                Ok(json) => println!("{json}"),
                Err(err) => println!("tenancy payload unavailable: {err}"),
            }
        }
        other => println!("\nTenancy creation did not complete: {other:?}"),
    }

    if show_recovery {
        run_recovery_walkthrough(&backend, &notifier).await?;
    }

    let events = notifier.events();
    if events.is_empty() {
        println!("\nNotices: none emitted");
    } else {
        println!("\nNotices emitted along the way");
        for notice in events {
            println!("- {}", notice.message());
        }
    }

    Ok(())
}

/// Create a draft up to the signing step, delete its agreement behind the
/// wizard's back, and show the reset-to-start recovery.
async fn run_recovery_walkthrough(
    backend: &Arc<InMemoryLeasingBackend>,
    notifier: &Arc<RecordingNotifier>,
) -> Result<(), AppError> {
    println!("\nRecovery walkthrough: agreement deleted between sessions");

    let user = service_user();
    let units = backend
        .units_for_owner(&user.id)
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;
    let tenants = backend
        .tenants(TenantQuery::default())
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;

    let mut wizard = TenancyWizard::new(
        user.clone(),
        backend.clone(),
        backend.clone(),
        notifier.clone(),
    );
    wizard.select_unit(units.first().cloned());
    wizard.select_tenant(tenants.first().cloned());
    wizard.confirm_parties()?;
    wizard.submit_rent_terms(
        RentTerms {
            amount: 900.0,
            cycle: RentCycle::Monthly,
            due_date_day: Some(1),
            utilities_included: Some(false),
        },
        None,
    )?;
    wizard.submit_clauses(stock_clauses(), None, None).await?;

    let agreement_id = wizard
        .store()
        .agreement_id()
        .cloned()
        .ok_or_else(|| AppError::Io(std::io::Error::other("agreement missing after creation")))?;
    let persisted = serde_json::to_string(wizard.draft())
        .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;
    println!("Draft persisted on step 4 with agreement {}", agreement_id.0);

    backend.delete_agreement(&agreement_id);
    println!("Agreement {} deleted server side", agreement_id.0);

    let draft: WizardDraft = serde_json::from_str(&persisted)
        .map_err(|err| AppError::Io(std::io::Error::other(err.to_string())))?;
    let mut resumed = TenancyWizard::resume(
        WizardStore::from_draft(draft),
        user,
        backend.clone(),
        backend.clone(),
        notifier.clone(),
    );
    resumed.enter_signing().await?;

    if resumed.step() == WizardStep::SelectParties {
        println!("Resumed session detected the missing agreement and reset to step 1");
    } else {
        println!("Resumed session is on step {}", resumed.step().index());
    }

    Ok(())
}

fn print_outcome(label: &str, outcome: StepOutcome) {
    match outcome {
        StepOutcome::Advanced => println!("{label}: advanced"),
        StepOutcome::Stayed => println!("{label}: failed, staying on the current step"),
        StepOutcome::Reset => println!("{label}: resource missing, wizard reset"),
        StepOutcome::Superseded => println!("{label}: stale response dropped"),
    }
}
