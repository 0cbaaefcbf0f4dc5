mod external_changes;
