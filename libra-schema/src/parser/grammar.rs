//! Pest grammar for type specifications and default expressions.

use pest_derive::Parser;

/// The type-spec parser.
#[derive(Parser)]
#[grammar = "parser/type_spec.pest"]
pub struct TypeSpecParser;

#[cfg(test)]
mod tests {
    use super::*;
    use pest::Parser;

    #[test]
    fn test_parse_identifier() {
        assert!(TypeSpecParser::parse(Rule::identifier, "Float").is_ok());
        assert!(TypeSpecParser::parse(Rule::identifier, "timezone.utc").is_ok());
        assert!(TypeSpecParser::parse(Rule::identifier, "9lives").is_err());
    }

    #[test]
    fn test_parse_literals() {
        assert!(TypeSpecParser::parse(Rule::string_literal, "'it''s'").is_ok());
        assert!(TypeSpecParser::parse(Rule::string_literal, "\"plain\"").is_ok());
        assert!(TypeSpecParser::parse(Rule::number_literal, "-12.5e3").is_ok());
        assert!(TypeSpecParser::parse(Rule::boolean_literal, "True").is_ok());
    }

    #[test]
    fn test_boolean_needs_word_boundary() {
        assert!(TypeSpecParser::parse(Rule::boolean_literal, "Trueish").is_err());
    }

    #[test]
    fn test_parse_type_spec() {
        let result = TypeSpecParser::parse(Rule::type_spec_input, "Integer");
        assert!(result.is_ok());

        let result = TypeSpecParser::parse(
            Rule::type_spec_input,
            "Float(precision = 53, asdecimal = True, decimal_return_scale = 3)",
        );
        assert!(result.is_ok(), "Failed to parse: {:?}", result.err());

        let result = TypeSpecParser::parse(Rule::type_spec_input, "ARRAY(String(8), dimensions=2,)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_rejects_unbalanced() {
        assert!(TypeSpecParser::parse(Rule::type_spec_input, "String(30").is_err());
        assert!(TypeSpecParser::parse(Rule::type_spec_input, "String(30))").is_err());
        assert!(TypeSpecParser::parse(Rule::type_spec_input, "").is_err());
    }

    #[test]
    fn test_parse_default_input() {
        assert!(TypeSpecParser::parse(Rule::default_input, "999.999").is_ok());
        assert!(TypeSpecParser::parse(Rule::default_input, "datetime.now(timezone.utc)").is_ok());
        assert!(TypeSpecParser::parse(Rule::default_input, "datetime.now").is_err());
    }

    #[test]
    fn test_parse_list_input() {
        assert!(TypeSpecParser::parse(Rule::list_input, "['a', 'b']").is_ok());
        assert!(TypeSpecParser::parse(Rule::list_input, "[]").is_ok());
        assert!(TypeSpecParser::parse(Rule::list_input, "['a'").is_err());
    }
}
