use crate::types::{Column, ColumnType};

/// Configuration of one business table: its storage name and the ordered
/// column list the grid, exporter and importer all share.
#[derive(Debug, Clone)]
pub struct TableConfig {
    pub name: &'static str,
    pub columns: Vec<Column>,
}

impl TableConfig {
    pub fn has_key(&self, key: &str) -> bool {
        self.columns.iter().any(|c| c.key == key)
    }

    pub fn column_keys(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.key.as_str()).collect()
    }
}

pub fn invoices() -> TableConfig {
    TableConfig {
        name: "invoices",
        columns: vec![
            Column::new("invoice_code", "Code"),
            Column::new("invoice_number", "Number"),
            Column::typed("total_amount_tax_included", "Total Amount", ColumnType::Number),
            Column::new("verification_status", "Status"),
            Column::new("created_at", "Created At").readonly(),
        ],
    }
}

pub fn contracts() -> TableConfig {
    TableConfig {
        name: "contracts",
        columns: vec![
            Column::new("contract_no", "Contract No."),
            Column::new("title", "Title"),
            Column::new("party_a", "Party A"),
            Column::new("party_b", "Party B"),
            Column::typed("total_amount", "Amount", ColumnType::Number),
            Column::typed("start_date", "Start Date", ColumnType::Date),
            Column::typed("end_date", "End Date", ColumnType::Date),
            Column::new("contract_type", "Type"),
            Column::new("verification_status", "Status"),
        ],
    }
}

pub fn bank_statements() -> TableConfig {
    TableConfig {
        name: "bank_statements",
        columns: vec![
            Column::typed("transaction_date", "Date", ColumnType::Date),
            Column::new("counterparty_name", "Counterparty"),
            Column::typed("debit_amount", "Debit", ColumnType::Number),
            Column::typed("credit_amount", "Credit", ColumnType::Number),
            Column::new("summary", "Summary"),
            Column::new("account_number", "Account"),
            Column::new("account_name", "Account Name"),
            Column::new("bank_name", "Bank"),
            Column::new("currency", "Currency"),
        ],
    }
}

pub fn payroll_records() -> TableConfig {
    TableConfig {
        name: "payroll_records",
        columns: vec![
            Column::new("employee_id", "Employee ID"),
            Column::new("pay_period", "Period"),
            Column::typed("base_salary", "Base Salary", ColumnType::Number),
            Column::typed("position_subsidy", "Position Subsidy", ColumnType::Number),
            Column::typed("total_deductions", "Deductions", ColumnType::Number),
            Column::typed("net_pay", "Net Pay", ColumnType::Number),
        ],
    }
}

/// All built-in business tables, in dashboard order.
pub fn all() -> Vec<TableConfig> {
    vec![invoices(), contracts(), bank_statements(), payroll_records()]
}
