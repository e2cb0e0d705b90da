//! Column-role guessing from header names.

/// Pick the amount column: the first header containing `importe`, else the last.
pub fn guess_amount_column(columns: &[String]) -> Option<&str> {
    columns
        .iter()
        .find(|name| name.to_lowercase().contains("importe"))
        .or_else(|| columns.last())
        .map(String::as_str)
}

/// Pick the column shown as the operation label in progress reports.
///
/// The first header containing `oper` or `op.`, else the first column.
pub fn guess_operation_column(columns: &[String]) -> Option<&str> {
    columns
        .iter()
        .find(|name| {
            let lower = name.to_lowercase();
            lower.contains("oper") || lower.contains("op.")
        })
        .or_else(|| columns.first())
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn amount_prefers_importe_header() {
        let columns = cols(&["Operacion", "Importe Total", "Salto"]);
        assert_eq!(guess_amount_column(&columns), Some("Importe Total"));
    }

    #[test]
    fn amount_falls_back_to_last_column() {
        let columns = cols(&["A", "B", "C"]);
        assert_eq!(guess_amount_column(&columns), Some("C"));
        assert_eq!(guess_amount_column(&[]), None);
    }

    #[test]
    fn operation_matches_abbreviation() {
        let columns = cols(&["Fecha", "Nº Op.", "Importe"]);
        assert_eq!(guess_operation_column(&columns), Some("Nº Op."));
    }

    #[test]
    fn operation_falls_back_to_first_column() {
        let columns = cols(&["Tercero", "Importe"]);
        assert_eq!(guess_operation_column(&columns), Some("Tercero"));
    }
}
