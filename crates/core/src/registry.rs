//! Declarative schema registry for every replicated collection.
//!
//! One [`CollectionSpec`] per master-data collection, plus one for the
//! company profile and one for license info. Each spec lists, in persist
//! order, the external column name exposed by the driver, the internal
//! semantic key (also the local column name), and the declared
//! [`FieldKind`]. The fetch layer derives its `SELECT` from the field list,
//! the persistence layer derives its column list from the same table, so
//! the two can never drift apart.

use crate::value::FieldKind;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One mapped field: external driver column -> internal semantic key.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Column name as exposed by the driver, without the `$` prefix.
    pub column: &'static str,
    /// Internal semantic key; doubles as the local table column name.
    pub key: &'static str,
    /// Declared semantic type, consumed by the value converter.
    pub kind: FieldKind,
}

/// A replicated collection: where it comes from and where it lands.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSpec {
    /// Human-readable label used in progress messages and logs.
    pub label: &'static str,
    /// Driver-side collection name queried with `SELECT $... FROM <source>`.
    pub source: &'static str,
    /// Local table the records are persisted into.
    pub table: &'static str,
    /// Semantic key that must be non-null and unique per row.
    pub unique_key: &'static str,
    /// Mapped fields in persist order.
    pub fields: &'static [FieldSpec],
}

impl CollectionSpec {
    /// Build the driver query for this collection.
    ///
    /// The driver exposes fields with a `$` prefix; the result-set column
    /// names echo that prefix back, which the fetcher strips on lookup.
    pub fn select_query(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|f| format!("${}", f.column))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {fields} FROM {}", self.source)
    }

    /// Look up a field by external column name, case-insensitively.
    pub fn field_for_column(&self, column: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.column.eq_ignore_ascii_case(column))
    }

    /// Local column names in persist order.
    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.key)
    }
}

const fn f(column: &'static str, key: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { column, key, kind }
}

use FieldKind::{Boolean, Date, Integer, Real, Text};

// ---------------------------------------------------------------------------
// Company profile and license info
// ---------------------------------------------------------------------------

/// Profile of the company currently loaded in the external system.
///
/// Persisted onto the `companies` row, not through the bulk persister, so
/// `table`/`unique_key` name the companies table for reference only.
pub static COMPANY_PROFILE: CollectionSpec = CollectionSpec {
    label: "Company profile",
    source: "HSp_CMPScreennColl",
    table: "companies",
    unique_key: "tally_company_name",
    fields: &[
        f("Name", "tally_company_name", Text),
        f("BasicCompanyFormalName", "formal_name", Text),
        f("Address", "address", Text),
        f("StateName", "state_name", Text),
        f("CountryName", "country_name", Text),
        f("PinCode", "pincode", Text),
        f("PhoneNumber", "phone_number", Text),
        f("MobileNo", "mobile_no", Text),
        f("FaxNumber", "fax_number", Text),
        f("Email", "email", Text),
        f("Website", "website", Text),
        f("StartingFrom", "start_date", Date),
        f("BooksFrom", "books_date", Date),
        f("IsSecurityOn", "is_security_on", Boolean),
        f("OwnerName", "owner_name", Text),
        f("IsTallyAuditOn", "is_tally_audit_on", Boolean),
        f("IsDisAllowInEduMode", "is_disallow_edu", Boolean),
        f("CurrencyName", "currency_name", Text),
        f("FormalName", "currency_formal_name", Text),
        f("IsSuffix", "is_currency_suffix", Boolean),
        f("InMillions", "in_millions", Boolean),
        f("DecimalPlaces", "decimal_places", Integer),
        f("DecimalSymbol", "decimal_symbol", Text),
        f("DecimalPlacesForPrinting", "decimal_places_printing", Integer),
        f("GUID", "guid", Text),
        f("Masterid", "master_id", Integer),
        f("Alterid", "alter_id", Integer),
    ],
};

/// License details of the external installation, stored on the company row.
pub static LICENSE_INFO: CollectionSpec = CollectionSpec {
    label: "License info",
    source: "HSPTallyLicensecoll",
    table: "companies",
    unique_key: "serial_number",
    fields: &[
        f("TallySerialNo", "serial_number", Text),
        f("TallyAccountID", "account_id", Text),
        f("TallySiteID", "site_id", Text),
        f("TallyAdminEmailID", "admin_email", Text),
        f("TallyIsIndian", "is_indian", Boolean),
        f("TallyIsSilver", "is_silver", Boolean),
        f("TallyIsGold", "is_gold", Boolean),
        f("TallyIsLicensedMode", "is_licensed", Boolean),
        f("TallyInstalledVersion", "version", Text),
        f("TAllygatewayserver", "gateway_server", Text),
        f("TallyActingAs", "acting_as", Text),
        f("TallyODBCEnabled", "odbc_enabled", Boolean),
        f("TallyODBCPort", "odbc_port", Integer),
    ],
};

// ---------------------------------------------------------------------------
// Master-data collections
// ---------------------------------------------------------------------------

/// The master-data collections, in the order a sync run processes them.
pub static MASTER_COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        label: "Accounting groups",
        source: "HSpAccGroupsColl",
        table: "tally_accounting_groups",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("Parent", "parent", Text),
            f("IsSubLedger", "is_subledger", Boolean),
            f("IsAddable", "is_addable", Boolean),
            f("BasicGroupIsCalculable", "basic_group_is_calculable", Boolean),
            f("AddlAllocType", "addl_alloctype", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Ledgers",
        source: "HSpLedgersColl",
        table: "tally_ledgers",
        unique_key: "tally_guid",
        fields: &[
            f("GUID", "tally_guid", Text),
            f("Name", "tally_name", Text),
            f("Parent", "parent_name", Text),
            f("CurrencyName", "currency_name", Text),
            f("OpeningBalance", "opening_balance", Real),
            f("ClosingBalance", "closing_balance", Real),
            f("IsBillWiseOn", "is_billwise_on", Boolean),
            f("AffectsStock", "affects_stock", Boolean),
            f("IsCostCentresOn", "is_cost_centres_on", Boolean),
            f("GSTRegistrationType", "gst_registration_type", Text),
            f("PartyGSTIN", "party_gstin", Text),
        ],
    },
    CollectionSpec {
        label: "Ledger bill-wise allocations",
        source: "HSpLedgerBillwiseColl",
        table: "tally_ledgerbillwise",
        unique_key: "name",
        fields: &[
            f("LedgerGUID", "ledger_guid", Text),
            f("Name", "name", Text),
            f("BillDate", "billdate", Date),
            f("BillCreditPeriod", "billcreditperiod", Text),
            f("IsAdvance", "isadvance", Boolean),
            f("OpeningBalance", "openingbalance", Real),
        ],
    },
    CollectionSpec {
        label: "Cost categories",
        source: "HSpCostCategoryColl",
        table: "tally_costcategory",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("AllocateRevenue", "allocate_revenue", Boolean),
            f("AllocateNonRevenue", "allocate_nonrevenue", Boolean),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Cost centers",
        source: "HSpCostCentreColl",
        table: "tally_costcenter",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("Category", "category", Text),
            f("Parent", "parent", Text),
            f("RevenueLedgerForOpBal", "revenue_ledger_for_opbal", Text),
            f("EmailId", "email_id", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Currencies",
        source: "HSpCurrencyColl",
        table: "tally_currency",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("MailingName", "mailing_name", Text),
            f("ISOCurrencyCode", "iso_currency_code", Text),
            f("DecimalPlaces", "decimal_places", Integer),
            f("InMillions", "in_millions", Boolean),
            f("IsSuffix", "is_suffix", Boolean),
            f("HasSpace", "has_space", Boolean),
            f("DecimalSymbol", "decimal_symbol", Text),
            f("DecimalPlacesForPrinting", "decimal_places_printing", Integer),
            f("SortPosition", "sort_position", Integer),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Voucher types",
        source: "HSpVoucherTypeColl",
        table: "tally_vouchertype",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("Parent", "parent", Text),
            f("AdditionalName", "additional_name", Text),
            f("IsActive", "is_active", Boolean),
            f("NumberingMethod", "numbering_method", Text),
            f("PreventDuplicates", "prevent_duplicates", Boolean),
            f("EffectiveDate", "effective_date", Date),
            f("UseZeroEntries", "use_zero_entries", Boolean),
            f("PrintAfterSave", "print_after_save", Boolean),
            f("FormalReceipt", "formal_receipt", Boolean),
            f("IsOptional", "is_optional", Boolean),
            f("AsMfgJrnl", "as_mfg_jrnl", Boolean),
            f("CommonNarration", "common_narration", Boolean),
            f("MultiNarration", "multi_narration", Boolean),
            f("UseForPOSInvoice", "use_for_pos_invoice", Boolean),
            f("UseForJobwork", "use_for_jobwork", Boolean),
            f("IsForJobworkIn", "is_for_jobwork_in", Boolean),
            f("AllowConsumption", "allow_consumption", Boolean),
            f("IsDefaultAllocEnabled", "is_default_alloc_enabled", Boolean),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Stock groups",
        source: "HSpStockGroupsColl",
        table: "tally_stock_groups",
        unique_key: "tally_guid",
        fields: &[
            f("GUID", "tally_guid", Text),
            f("Name", "tally_name", Text),
            f("Parent", "parent_name", Text),
            f("IsAddable", "is_addable", Boolean),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Stock items",
        source: "HSpStockItemsColl",
        table: "tally_stock_items",
        unique_key: "tally_guid",
        fields: &[
            f("GUID", "tally_guid", Text),
            f("Name", "tally_name", Text),
            f("Parent", "parent_name", Text),
            f("Category", "category_name", Text),
            f("BaseUnits", "base_units", Text),
            f("GSTApplicable", "gst_applicable", Text),
            f("GSTTypeOfSupply", "gst_type_of_supply", Text),
            f("HSNCode", "hsn_code", Text),
            f("OpeningBalance", "opening_balance", Real),
            f("OpeningRate", "opening_rate", Real),
            f("OpeningValue", "opening_value", Real),
            f("ClosingBalance", "closing_balance", Real),
            f("ClosingRate", "closing_rate", Real),
            f("ClosingValue", "closing_value", Real),
        ],
    },
    CollectionSpec {
        label: "Units",
        source: "HSpUnitsColl",
        table: "tally_units",
        unique_key: "tally_guid",
        fields: &[
            f("GUID", "tally_guid", Text),
            f("Name", "tally_name", Text),
            f("OriginalName", "original_name", Text),
            f("BaseUnits", "base_units", Text),
            f("AdditionalUnits", "additional_units", Text),
            f("Conversion", "conversion", Real),
            f("DecimalPlaces", "decimal_places", Integer),
            f("IsSimpleUnit", "is_simple_unit", Boolean),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Stock group GST details",
        source: "HSpStockGroupGSTColl",
        table: "tally_stockgroupwithgst",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("Parent", "parent", Text),
            f("IsAddable", "is_addable", Boolean),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
            f("GSTRateDutyHead", "gst_rate_duty_head", Text),
            f("GSTRateValuationType", "gst_rate_valuation_type", Text),
            f("GSTRate", "gst_rate", Real),
            f("ApplicableFrom", "applicable_from", Date),
            f("HSNCode", "hsn_code", Text),
            f("HSN", "hsn", Text),
            f("Taxability", "taxability", Text),
            f("IsReverseChargeApplicable", "is_reverse_charge_applicable", Boolean),
            f("IsNonGSTGoods", "is_non_gst_goods", Boolean),
            f("GSTIneligibleITC", "gst_ineligible_itc", Boolean),
        ],
    },
    CollectionSpec {
        label: "Stock categories",
        source: "HSpStockCategoryColl",
        table: "tally_stockcategory",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("Parent", "parent", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Godowns",
        source: "HSpGodownColl",
        table: "tally_godown",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("Parent", "parent", Text),
            f("HasNoSpace", "has_no_space", Boolean),
            f("IsInternal", "is_internal", Boolean),
            f("IsExternal", "is_external", Boolean),
            f("Address", "address", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
        ],
    },
    CollectionSpec {
        label: "Stock item GST details",
        source: "HSpStockItemGSTColl",
        table: "tally_stockitem_gst",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
            f("GSTRateDutyHead", "gst_rate_duty_head", Text),
            f("GSTRateValuationType", "gst_rate_valuation_type", Text),
            f("GSTRate", "gst_rate", Real),
            f("ApplicableFrom", "applicable_from", Date),
            f("HSNCode", "hsn_code", Text),
            f("HSN", "hsn", Text),
            f("Taxability", "taxability", Text),
            f("IsReverseChargeApplicable", "is_reverse_charge_applicable", Boolean),
            f("IsNonGSTGoods", "is_non_gst_goods", Boolean),
            f("GSTIneligibleITC", "gst_ineligible_itc", Boolean),
        ],
    },
    CollectionSpec {
        label: "Stock item MRP details",
        source: "HSpStockItemMRPColl",
        table: "tally_stockitem_mrp",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
            f("FromDate", "from_date", Date),
            f("StateName", "state_name", Text),
            f("MRPRate", "mrp_rate", Real),
        ],
    },
    CollectionSpec {
        label: "Stock item BOM",
        source: "HSpStockItemBOMColl",
        table: "tally_stockitem_bom",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
            f("NatureOfItem", "nature_of_item", Text),
            f("StockItemName", "stockitem_name", Text),
            f("GodownName", "godown_name", Text),
            f("ActualQty", "actual_qty", Real),
            f("ComponentListName", "component_list_name", Text),
            f("ComponentBasicQty", "component_basic_qty", Real),
        ],
    },
    CollectionSpec {
        label: "Stock item standard costs",
        source: "HSpStockItemStdCostColl",
        table: "tally_stockitem_standardcost",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
            f("Date", "date", Date),
            f("Rate", "rate", Real),
        ],
    },
    CollectionSpec {
        label: "Stock item standard prices",
        source: "HSpStockItemStdPriceColl",
        table: "tally_stockitem_standardprice",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
            f("Date", "date", Date),
            f("Rate", "rate", Real),
        ],
    },
    CollectionSpec {
        label: "Stock item batch details",
        source: "HSpStockItemBatchColl",
        table: "tally_stockitem_batchdetails",
        unique_key: "name",
        fields: &[
            f("Name", "name", Text),
            f("MasterId", "master_id", Integer),
            f("AlterId", "alter_id", Integer),
            f("MfgDate", "mfg_date", Date),
            f("GodownName", "godown_name", Text),
            f("BatchName", "batch_name", Text),
            f("OpeningBalance", "opening_balance", Real),
            f("OpeningValue", "opening_value", Real),
            f("OpeningRate", "opening_rate", Real),
            f("ExpiryPeriod", "expiry_period", Text),
        ],
    },
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
