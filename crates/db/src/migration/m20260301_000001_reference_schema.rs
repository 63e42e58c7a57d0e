//! Reference property-management schema with row-level security.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: TABLES
        // ============================================================
        db.execute_unprepared(TABLES_SQL).await?;

        // ============================================================
        // PART 2: HELPERS
        // ============================================================
        db.execute_unprepared(HELPERS_SQL).await?;

        // ============================================================
        // PART 3: INDEXES
        // ============================================================
        db.execute_unprepared(INDEXES_SQL).await?;

        // ============================================================
        // PART 4: ROW-LEVEL SECURITY
        // ============================================================
        db.execute_unprepared(RLS_SQL).await?;

        // ============================================================
        // PART 5: PROBE ROLE
        // ============================================================
        db.execute_unprepared(ROLE_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const TABLES_SQL: &str = r"
CREATE TABLE profiles (
    id UUID PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    full_name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE properties (
    id UUID PRIMARY KEY,
    owner_id UUID NOT NULL REFERENCES profiles(id),
    name TEXT NOT NULL,
    address TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE units (
    id UUID PRIMARY KEY,
    property_id UUID NOT NULL REFERENCES properties(id),
    label TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE tenants (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    property_id UUID NOT NULL REFERENCES properties(id),
    unit_id UUID REFERENCES units(id),
    full_name TEXT NOT NULL,
    email TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE leases (
    id UUID PRIMARY KEY,
    unit_id UUID NOT NULL REFERENCES units(id),
    reference TEXT NOT NULL,
    starts_on DATE NOT NULL DEFAULT CURRENT_DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE maintenance_requests (
    id UUID PRIMARY KEY,
    unit_id UUID NOT NULL REFERENCES units(id),
    title TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'open',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE rent_payments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    lease_id UUID NOT NULL REFERENCES leases(id),
    amount NUMERIC(12, 2) NOT NULL,
    paid_on DATE NOT NULL DEFAULT CURRENT_DATE
);

CREATE TABLE documents (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    property_id UUID NOT NULL REFERENCES properties(id),
    title TEXT NOT NULL,
    storage_path TEXT NOT NULL
);

CREATE TABLE expenses (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    owner_id UUID NOT NULL REFERENCES profiles(id),
    property_id UUID REFERENCES properties(id),
    amount NUMERIC(12, 2) NOT NULL,
    description TEXT
);

CREATE TABLE notifications (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id UUID NOT NULL REFERENCES profiles(id),
    body TEXT NOT NULL,
    read_at TIMESTAMPTZ
);

CREATE TABLE messages (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    sender_id UUID NOT NULL REFERENCES profiles(id),
    recipient_id UUID NOT NULL REFERENCES profiles(id),
    body TEXT NOT NULL,
    sent_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE property_photos (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    property_id UUID NOT NULL REFERENCES properties(id),
    url TEXT NOT NULL
);

CREATE TABLE activity_log (
    id BIGSERIAL PRIMARY KEY,
    actor_id UUID REFERENCES profiles(id),
    action TEXT NOT NULL,
    at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE feature_flags (
    key TEXT PRIMARY KEY,
    enabled BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE app_settings (
    key TEXT PRIMARY KEY,
    value JSONB NOT NULL
);
";

const HELPERS_SQL: &str = r"
CREATE OR REPLACE FUNCTION current_user_id() RETURNS UUID
LANGUAGE sql STABLE AS $$
    SELECT NULLIF(current_setting('app.current_user_id', true), '')::uuid
$$;

CREATE OR REPLACE FUNCTION user_owns_property(target UUID) RETURNS BOOLEAN
LANGUAGE sql STABLE AS $$
    SELECT EXISTS (
        SELECT 1 FROM properties p
        WHERE p.id = target AND p.owner_id = current_user_id()
    )
$$;

CREATE OR REPLACE FUNCTION user_owns_unit(target UUID) RETURNS BOOLEAN
LANGUAGE sql STABLE AS $$
    SELECT EXISTS (
        SELECT 1 FROM units u
        JOIN properties p ON p.id = u.property_id
        WHERE u.id = target AND p.owner_id = current_user_id()
    )
$$;
";

const INDEXES_SQL: &str = r"
CREATE INDEX idx_properties_owner_id ON properties(owner_id);
CREATE INDEX idx_units_property_id ON units(property_id);
CREATE INDEX idx_tenants_property_id ON tenants(property_id);
CREATE INDEX idx_leases_unit_id ON leases(unit_id);
CREATE INDEX idx_maintenance_requests_unit_id ON maintenance_requests(unit_id);
CREATE INDEX idx_rent_payments_lease_id ON rent_payments(lease_id);
CREATE INDEX idx_documents_property_id ON documents(property_id);
";

const RLS_SQL: &str = r"
ALTER TABLE profiles ENABLE ROW LEVEL SECURITY;
ALTER TABLE properties ENABLE ROW LEVEL SECURITY;
ALTER TABLE units ENABLE ROW LEVEL SECURITY;
ALTER TABLE tenants ENABLE ROW LEVEL SECURITY;
ALTER TABLE leases ENABLE ROW LEVEL SECURITY;
ALTER TABLE maintenance_requests ENABLE ROW LEVEL SECURITY;
ALTER TABLE rent_payments ENABLE ROW LEVEL SECURITY;
ALTER TABLE documents ENABLE ROW LEVEL SECURITY;
ALTER TABLE expenses ENABLE ROW LEVEL SECURITY;
ALTER TABLE notifications ENABLE ROW LEVEL SECURITY;
ALTER TABLE messages ENABLE ROW LEVEL SECURITY;
ALTER TABLE property_photos ENABLE ROW LEVEL SECURITY;
ALTER TABLE activity_log ENABLE ROW LEVEL SECURITY;

CREATE POLICY profiles_self ON profiles FOR ALL
    USING (id = current_user_id())
    WITH CHECK (id = current_user_id());

CREATE POLICY properties_owner ON properties FOR ALL
    USING (owner_id = current_user_id())
    WITH CHECK (owner_id = current_user_id());

CREATE POLICY units_owner ON units FOR ALL
    USING (user_owns_property(property_id))
    WITH CHECK (user_owns_property(property_id));

CREATE POLICY tenants_owner ON tenants FOR ALL
    USING (user_owns_property(property_id))
    WITH CHECK (user_owns_property(property_id));

CREATE POLICY leases_owner ON leases FOR ALL
    USING (user_owns_unit(unit_id))
    WITH CHECK (user_owns_unit(unit_id));

CREATE POLICY maintenance_requests_owner ON maintenance_requests FOR ALL
    USING (user_owns_unit(unit_id))
    WITH CHECK (user_owns_unit(unit_id));

CREATE POLICY rent_payments_owner ON rent_payments FOR ALL
    USING (EXISTS (SELECT 1 FROM leases l WHERE l.id = lease_id AND user_owns_unit(l.unit_id)))
    WITH CHECK (EXISTS (SELECT 1 FROM leases l WHERE l.id = lease_id AND user_owns_unit(l.unit_id)));

CREATE POLICY documents_owner ON documents FOR ALL
    USING (user_owns_property(property_id))
    WITH CHECK (user_owns_property(property_id));

CREATE POLICY expenses_owner ON expenses FOR ALL
    USING (owner_id = current_user_id())
    WITH CHECK (owner_id = current_user_id());

CREATE POLICY notifications_recipient ON notifications FOR ALL
    USING (user_id = current_user_id());

CREATE POLICY messages_participant ON messages FOR SELECT
    USING (sender_id = current_user_id() OR recipient_id = current_user_id());

CREATE POLICY messages_sender ON messages FOR INSERT
    WITH CHECK (sender_id = current_user_id());

CREATE POLICY property_photos_owner ON property_photos FOR ALL
    USING (user_owns_property(property_id));

CREATE POLICY activity_log_actor ON activity_log FOR SELECT
    USING (actor_id = current_user_id());
";

const ROLE_SQL: &str = r"
DO $$
BEGIN
    IF NOT EXISTS (SELECT 1 FROM pg_roles WHERE rolname = 'rlsguard_app') THEN
        CREATE ROLE rlsguard_app NOLOGIN;
    END IF;
END
$$;

GRANT USAGE ON SCHEMA public TO rlsguard_app;
GRANT SELECT, INSERT, UPDATE, DELETE ON ALL TABLES IN SCHEMA public TO rlsguard_app;
GRANT EXECUTE ON FUNCTION current_user_id(), user_owns_property(UUID), user_owns_unit(UUID) TO rlsguard_app;
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS app_settings, feature_flags, activity_log, property_photos, messages,
    notifications, expenses, documents, rent_payments, maintenance_requests, leases, tenants,
    units, properties, profiles CASCADE;
DROP FUNCTION IF EXISTS user_owns_unit(UUID), user_owns_property(UUID), current_user_id();
";
