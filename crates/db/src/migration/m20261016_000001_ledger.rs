//! Ledger schema migration.
//!
//! Creates the account registry, the append-only entry log with its lines,
//! and the triggers that keep the log immutable and balanced.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: ACCOUNT REGISTRY
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: ENTRY LOG
        // ============================================================
        db.execute_unprepared(LEDGER_ENTRIES_SQL).await?;
        db.execute_unprepared(LEDGER_LINES_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_kind AS ENUM (
    'cash', 'bank', 'receivable', 'payable', 'agent', 'sales', 'commission', 'suspense'
);

CREATE TYPE transaction_kind AS ENUM ('debit', 'credit');

CREATE TYPE service_category AS ENUM (
    'ticket', 'hotel', 'transport', 'package', 'payment', 'commission', 'refund', 'other'
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    organization_id BIGINT,
    branch_id BIGINT,
    agency_id BIGINT,
    kind account_kind NOT NULL,
    name VARCHAR(255) NOT NULL,
    balance NUMERIC(20, 2) NOT NULL DEFAULT 0,
    version BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_accounts_single_owner CHECK (
        num_nonnulls(organization_id, branch_id, agency_id) <= 1
    ),
    CONSTRAINT chk_accounts_version CHECK (version >= 0)
);

-- NULLS NOT DISTINCT (Postgres 15+) keeps unscoped accounts unique per kind
-- without mapping a NULL owner onto a real id.
CREATE UNIQUE INDEX uq_accounts_scope_kind ON accounts (
    organization_id,
    branch_id,
    agency_id,
    kind
) NULLS NOT DISTINCT;

CREATE INDEX idx_accounts_organization ON accounts(organization_id) WHERE organization_id IS NOT NULL;
CREATE INDEX idx_accounts_branch ON accounts(branch_id) WHERE branch_id IS NOT NULL;
CREATE INDEX idx_accounts_agency ON accounts(agency_id) WHERE agency_id IS NOT NULL;
";

const LEDGER_ENTRIES_SQL: &str = r"
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    transaction_kind transaction_kind NOT NULL,
    service_category service_category NOT NULL,
    transaction_amount NUMERIC(20, 2) NOT NULL,

    booking_id BIGINT,
    organization_id BIGINT,
    inventory_owner_organization_id BIGINT,
    branch_id BIGINT,
    agency_id BIGINT,
    area_agency_id BIGINT,

    payment_ids JSONB NOT NULL DEFAULT '[]',
    narration TEXT NOT NULL DEFAULT '',
    remarks TEXT,
    metadata JSONB NOT NULL DEFAULT '{}',
    notes JSONB NOT NULL DEFAULT '[]',

    reversed BOOLEAN NOT NULL DEFAULT FALSE,
    reversed_of UUID UNIQUE REFERENCES ledger_entries(id),
    reversed_at TIMESTAMPTZ,
    reversed_by BIGINT,

    created_by BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_entries_amount_positive CHECK (transaction_amount > 0),
    CONSTRAINT chk_entries_not_self_reversal CHECK (reversed_of IS DISTINCT FROM id),
    CONSTRAINT chk_entries_reversal_recorded CHECK (
        (reversed AND reversed_at IS NOT NULL AND reversed_by IS NOT NULL)
        OR (NOT reversed AND reversed_at IS NULL AND reversed_by IS NULL)
    ),
    CONSTRAINT chk_entries_notes_array CHECK (jsonb_typeof(notes) = 'array'),
    CONSTRAINT chk_entries_payment_ids_array CHECK (jsonb_typeof(payment_ids) = 'array')
);

CREATE INDEX idx_entries_organization ON ledger_entries(organization_id, created_at DESC);
CREATE INDEX idx_entries_owner_pair ON ledger_entries(organization_id, inventory_owner_organization_id);
CREATE INDEX idx_entries_branch ON ledger_entries(branch_id, created_at DESC) WHERE branch_id IS NOT NULL;
CREATE INDEX idx_entries_agency ON ledger_entries(agency_id, created_at DESC) WHERE agency_id IS NOT NULL;
CREATE INDEX idx_entries_area_agency ON ledger_entries(area_agency_id, created_at DESC) WHERE area_agency_id IS NOT NULL;
CREATE INDEX idx_entries_booking ON ledger_entries(booking_id) WHERE booking_id IS NOT NULL;
CREATE INDEX idx_entries_created ON ledger_entries(created_at DESC, id DESC);
";

const LEDGER_LINES_SQL: &str = r"
CREATE TABLE ledger_lines (
    id UUID PRIMARY KEY,
    entry_id UUID NOT NULL REFERENCES ledger_entries(id) ON DELETE RESTRICT,
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE RESTRICT,
    line_no INTEGER NOT NULL,
    debit NUMERIC(20, 2) NOT NULL DEFAULT 0,
    credit NUMERIC(20, 2) NOT NULL DEFAULT 0,
    account_version BIGINT NOT NULL,
    balance_after NUMERIC(20, 2) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    CONSTRAINT chk_lines_one_side CHECK (
        (debit > 0 AND credit = 0) OR (credit > 0 AND debit = 0)
    ),
    CONSTRAINT chk_lines_version_positive CHECK (account_version > 0),
    CONSTRAINT uq_lines_entry_line_no UNIQUE (entry_id, line_no),
    CONSTRAINT uq_lines_account_version UNIQUE (account_id, account_version)
);

CREATE INDEX idx_lines_entry ON ledger_lines(entry_id);
CREATE INDEX idx_lines_account ON ledger_lines(account_id, account_version);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_entry_balance
-- Every entry's lines must sum to equal debits and credits
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_balance()
RETURNS TRIGGER AS $$
DECLARE
    total_debit NUMERIC(20, 2);
    total_credit NUMERIC(20, 2);
BEGIN
    SELECT
        COALESCE(SUM(debit), 0),
        COALESCE(SUM(credit), 0)
    INTO total_debit, total_credit
    FROM ledger_lines
    WHERE entry_id = NEW.entry_id;

    IF total_debit <> total_credit THEN
        RAISE EXCEPTION 'Ledger entry % is not balanced. Debit: %, Credit: %',
            NEW.entry_id, total_debit, total_credit;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_balance
AFTER INSERT ON ledger_lines
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_balance();

-- ============================================================
-- FUNCTION: guard_ledger_entry_update
-- Entries are immutable apart from the one-way reversal flag
-- and appending audit notes
-- ============================================================
CREATE OR REPLACE FUNCTION guard_ledger_entry_update()
RETURNS TRIGGER AS $$
BEGIN
    IF (NEW.id, NEW.transaction_kind, NEW.service_category, NEW.transaction_amount,
        NEW.booking_id, NEW.organization_id, NEW.inventory_owner_organization_id,
        NEW.branch_id, NEW.agency_id, NEW.area_agency_id, NEW.payment_ids,
        NEW.narration, NEW.remarks, NEW.metadata, NEW.reversed_of,
        NEW.created_by, NEW.created_at)
       IS DISTINCT FROM
       (OLD.id, OLD.transaction_kind, OLD.service_category, OLD.transaction_amount,
        OLD.booking_id, OLD.organization_id, OLD.inventory_owner_organization_id,
        OLD.branch_id, OLD.agency_id, OLD.area_agency_id, OLD.payment_ids,
        OLD.narration, OLD.remarks, OLD.metadata, OLD.reversed_of,
        OLD.created_by, OLD.created_at)
    THEN
        RAISE EXCEPTION 'Ledger entry % is immutable. Post a reversal instead.', OLD.id;
    END IF;

    IF OLD.reversed AND (
        NOT NEW.reversed
        OR NEW.reversed_at IS DISTINCT FROM OLD.reversed_at
        OR NEW.reversed_by IS DISTINCT FROM OLD.reversed_by
    ) THEN
        RAISE EXCEPTION 'Ledger entry % is already reversed', OLD.id;
    END IF;

    IF NOT (NEW.notes @> OLD.notes
            AND jsonb_array_length(NEW.notes) >= jsonb_array_length(OLD.notes)) THEN
        RAISE EXCEPTION 'Notes on ledger entry % are append-only', OLD.id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_ledger_entry_update
BEFORE UPDATE ON ledger_entries
FOR EACH ROW
EXECUTE FUNCTION guard_ledger_entry_update();

-- ============================================================
-- FUNCTION: prevent_ledger_delete
-- Nothing is ever removed from the log
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_ledger_delete()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Cannot delete from %. Post a reversal instead.', TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_entry_delete
BEFORE DELETE ON ledger_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_delete();

-- ============================================================
-- FUNCTION: prevent_ledger_line_update
-- Lines are write-once
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_ledger_line_update()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Ledger line % is immutable', OLD.id;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_line_update
BEFORE UPDATE ON ledger_lines
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_line_update();

CREATE TRIGGER trg_prevent_line_delete
BEFORE DELETE ON ledger_lines
FOR EACH ROW
EXECUTE FUNCTION prevent_ledger_delete();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

-- Drop triggers
DROP TRIGGER IF EXISTS trg_prevent_line_delete ON ledger_lines;
DROP TRIGGER IF EXISTS trg_prevent_line_update ON ledger_lines;
DROP TRIGGER IF EXISTS trg_prevent_entry_delete ON ledger_entries;
DROP TRIGGER IF EXISTS trg_guard_ledger_entry_update ON ledger_entries;
DROP TRIGGER IF EXISTS trg_check_entry_balance ON ledger_lines;

-- Drop functions
DROP FUNCTION IF EXISTS prevent_ledger_line_update();
DROP FUNCTION IF EXISTS prevent_ledger_delete();
DROP FUNCTION IF EXISTS guard_ledger_entry_update();
DROP FUNCTION IF EXISTS check_entry_balance();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS ledger_lines CASCADE;
DROP TABLE IF EXISTS ledger_entries CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;

-- Drop enums
DROP TYPE IF EXISTS service_category;
DROP TYPE IF EXISTS transaction_kind;
DROP TYPE IF EXISTS account_kind;
";
