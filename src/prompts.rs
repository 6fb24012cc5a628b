//! Prompts for the structuring and vision-model OCR stages.
//!
//! The structuring template is half of a contract: it tells the model to
//! emit a pipe table whose columns follow [`crate::record::COLUMNS`], and
//! [`crate::pipeline::parse`] reads that table back positionally. Editing the
//! column instructions here without mirroring the parser silently
//! misassigns fields.

/// System message sent with every structuring request.
pub const STRUCTURING_SYSTEM_PROMPT: &str =
    "You are an assistant that extracts and formats data from text.";

/// Instructional template for the structuring request.
///
/// `{text}` is replaced with the OCR output by [`structuring_prompt`].
pub const STRUCTURING_TEMPLATE: &str = r#"I will send text extracted from photos of forms from a dental clinic. Each form contains one or more cell phone numbers, the patient's name, email, date of birth, CPF, and address. The task is to transcribe these details into a table.

- The patient's name is located on the 'NOME' line in the top left corner of the form.
- The phone number(s) are on the 'TELEFONE:' line in the top right corner of the form.
- The email, if present, is usually near the phone number or under the contact information.
- The date of birth may appear near or below the 'DATA DE NASCIMENTO' label.
- The CPF may be found near the 'CPF' label, often under or near the personal details.
- The address typically follows the 'ENDEREÇO' label.

The table must have exactly these columns, in this order:

1. Name: the patient's name.
2. Phone: one phone number.
3. Email: the email address.
4. CPF: the CPF number.
5. Date of Birth: the date of birth.
6. Address: the address.

Separate columns with the '|' character and put one row per line. If the form contains more than one phone number, create an additional row for each number, repeating the other details (name, email, CPF, date of birth and address) unchanged. Leave a cell empty when a value is missing, but keep all six columns.

**Example:**

| Name  | Phone  | Email        | CPF         | Date of Birth  | Address   |
|-------|--------|--------------|-------------|----------------|-----------|
| Joel  | number1| email@example.com | 123.456.789-00 | 01/01/1990 | 123 Main St |
| Joel  | number2| email@example.com | 123.456.789-00 | 01/01/1990 | 123 Main St |
| Joel  | number3| email@example.com | 123.456.789-00 | 01/01/1990 | 123 Main St |

Output ONLY the table. Do not add commentary.

**Extracted Text:**
{text}
"#;

/// System message for the vision-model OCR backend.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are a meticulous OCR engine. Transcribe every piece of text visible in the image of a scanned form.

- Preserve the reading order and keep each printed label next to its handwritten or typed value.
- Do not translate, summarise, correct or invent anything.
- If the image contains no readable text, output nothing.
- Output ONLY the transcription, without commentary or code fences."#;

/// User text sent alongside the scan; some providers reject an empty text part.
pub const OCR_USER_PROMPT: &str = "Transcribe this form.";

/// Build the user message for one structuring request.
pub fn structuring_prompt(raw_text: &str) -> String {
    STRUCTURING_TEMPLATE.replace("{text}", raw_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::COLUMNS;

    #[test]
    fn template_lists_columns_in_contract_order() {
        let mut last = 0;
        for (i, col) in COLUMNS.iter().enumerate() {
            let needle = format!("{}. {}:", i + 1, col);
            let pos = STRUCTURING_TEMPLATE
                .find(&needle)
                .unwrap_or_else(|| panic!("template missing '{needle}'"));
            assert!(pos > last, "column {col} out of order");
            last = pos;
        }
    }

    #[test]
    fn example_header_matches_columns() {
        let header = STRUCTURING_TEMPLATE
            .lines()
            .find(|l| l.starts_with("| Name"))
            .expect("example header");
        let cells: Vec<&str> = header.trim_matches('|').split('|').map(str::trim).collect();
        assert_eq!(cells, COLUMNS);
    }

    #[test]
    fn prompt_embeds_raw_text() {
        let p = structuring_prompt("NOME: Joel\nTELEFONE: 555-1111");
        assert!(p.contains("NOME: Joel\nTELEFONE: 555-1111"));
        assert!(!p.contains("{text}"));
    }
}
